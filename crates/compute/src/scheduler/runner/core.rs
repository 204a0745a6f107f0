use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use mergeline_core::SchedulerPolicy;

use crate::scheduler::task::TaskRef;

/// Handle returned by [`Scheduler::connect`], used to disconnect a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Called with the scheduler that just gained a task.
pub(super) type Listener = Rc<dyn Fn(&Scheduler)>;

pub(super) struct SchedulerInner {
    pub(super) name: String,
    pub(super) policy: SchedulerPolicy,
    /// Run set in insertion order; the policy picks from the front or back.
    pub(super) tasks: RefCell<Vec<TaskRef>>,
    /// "Runnable" listeners, notified whenever a task is added.
    pub(super) listeners: RefCell<Vec<(ListenerId, Listener)>>,
    pub(super) next_listener_id: Cell<u64>,
    /// Sub-schedulers linked via `add_scheduler`, with the listener installed on each.
    pub(super) children: RefCell<Vec<(Weak<SchedulerInner>, ListenerId)>>,
}

/// Cooperative task scheduler.
///
/// Runs many independent tasks one step at a time on the calling thread. An
/// external tick source (a host event loop) calls
/// [`run_one_step`](Scheduler::run_one_step) repeatedly while
/// [`has_pending`](Scheduler::has_pending) is true. Cloning yields another
/// handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) inner: Rc<SchedulerInner>,
}

impl Scheduler {
    /// Create a scheduler with the given selection policy.
    pub fn new(policy: SchedulerPolicy) -> Self {
        Self::named("scheduler", policy)
    }

    /// Create a named scheduler; the name shows up in logs when nested.
    pub fn named(name: impl Into<String>, policy: SchedulerPolicy) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                name: name.into(),
                policy,
                tasks: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
                next_listener_id: Cell::new(0),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Oldest-added task runs first.
    pub fn fifo() -> Self {
        Self::new(SchedulerPolicy::Fifo)
    }

    /// Most-recently-added task runs first.
    pub fn lifo() -> Self {
        Self::new(SchedulerPolicy::Lifo)
    }

    /// Register a "runnable" listener, called after every `add_task`.
    pub fn connect(&self, listener: impl Fn(&Scheduler) + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener_id.get());
        self.inner.next_listener_id.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. No-op if it is not connected.
    pub fn disconnect(&self, id: ListenerId) {
        self.inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
    }

    pub(super) fn notify_runnable(&self) {
        // Snapshot: listeners may connect or disconnect while being called.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(self);
        }
    }

    /// This scheduler as a task, for running it inside another scheduler.
    ///
    /// Every call returns a handle to the same task.
    pub fn as_task(&self) -> TaskRef {
        Rc::clone(&self.inner) as TaskRef
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn policy(&self) -> SchedulerPolicy {
        self.inner.policy
    }

    /// True while the run set is non-empty.
    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }

    /// Number of tasks in the run set.
    pub fn len(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Names of the tasks in the run set, in insertion order.
    pub fn task_names(&self) -> Vec<String> {
        self.inner
            .tasks
            .borrow()
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }
}

impl SchedulerInner {
    pub(super) fn has_pending(&self) -> bool {
        !self.tasks.borrow().is_empty()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.inner.name)
            .field("policy", &self.inner.policy)
            .field("tasks", &self.task_names())
            .finish()
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        let pending = self.tasks.get_mut().len();
        if pending > 0 {
            debug!(scheduler = %self.name, pending, "Scheduler dropped with tasks still pending");
        }
    }
}
