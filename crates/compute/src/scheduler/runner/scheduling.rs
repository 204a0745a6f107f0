use std::rc::Rc;

use tracing::trace;

use mergeline_core::SchedulerPolicy;

use crate::scheduler::task::{same_task, TaskRef};

use super::core::{Scheduler, SchedulerInner};

impl Scheduler {
    /// Add a task at the back of the run set and notify runnable listeners.
    ///
    /// A task that is already present is moved rather than duplicated.
    pub fn add_task(&self, task: TaskRef) {
        self.insert_task(task, false);
    }

    /// Add a task at the front of the run set and notify runnable listeners.
    pub fn add_task_front(&self, task: TaskRef) {
        self.insert_task(task, true);
    }

    fn insert_task(&self, task: TaskRef, at_front: bool) {
        trace!(scheduler = %self.inner.name, task = task.name(), at_front, "Adding task");
        {
            let mut tasks = self.inner.tasks.borrow_mut();
            tasks.retain(|t| !same_task(t, &task));
            if at_front {
                tasks.insert(0, task);
            } else {
                tasks.push(task);
            }
        }
        self.notify_runnable();
    }

    /// Remove a task from the run set. No-op if absent.
    pub fn remove_task(&self, task: &TaskRef) {
        self.inner.remove(task);
    }

    /// Drop every task from the run set.
    pub fn remove_all_tasks(&self) {
        self.inner.tasks.borrow_mut().clear();
    }

    pub fn contains_task(&self, task: &TaskRef) -> bool {
        self.inner.tasks.borrow().iter().any(|t| same_task(t, task))
    }

    /// Link `child` as a sub-scheduler.
    ///
    /// Whenever the child gains a task, the child itself is added to this
    /// scheduler's run set, so runnability propagates up a tree of
    /// schedulers. A child that already has work is added right away.
    pub fn add_scheduler(&self, child: &Scheduler) {
        let parent = Rc::downgrade(&self.inner);
        let id = child.connect(move |child: &Scheduler| {
            if let Some(inner) = parent.upgrade() {
                Scheduler { inner }.add_task(child.as_task());
            }
        });
        self.inner
            .children
            .borrow_mut()
            .push((Rc::downgrade(&child.inner), id));

        if child.has_pending() {
            self.add_task(child.as_task());
        }
    }

    /// Undo [`add_scheduler`](Self::add_scheduler): drop the child from the
    /// run set and stop propagating its runnable signal.
    pub fn remove_scheduler(&self, child: &Scheduler) {
        self.remove_task(&child.as_task());

        let mut children = self.inner.children.borrow_mut();
        let target = Rc::as_ptr(&child.inner);
        children.retain(|(weak, id)| {
            if std::ptr::eq(weak.as_ptr(), target) {
                child.disconnect(*id);
                false
            } else {
                weak.strong_count() > 0
            }
        });
    }
}

impl SchedulerInner {
    /// Task the policy would run next, if any.
    pub(super) fn current_task(&self) -> Option<TaskRef> {
        let tasks = self.tasks.borrow();
        match self.policy {
            SchedulerPolicy::Fifo => tasks.first().cloned(),
            SchedulerPolicy::Lifo => tasks.last().cloned(),
        }
    }

    /// Move a task that just stepped to the far end from where the policy
    /// picks, so the next step goes to another task. FIFO: oldest first,
    /// stepped task goes last. LIFO: newest first, stepped task goes to the
    /// front. No-op if the task left the run set while stepping.
    pub(super) fn yield_turn(&self, task: &TaskRef) {
        let mut tasks = self.tasks.borrow_mut();
        let Some(pos) = tasks.iter().position(|t| same_task(t, task)) else {
            return;
        };
        let task = tasks.remove(pos);
        match self.policy {
            SchedulerPolicy::Fifo => tasks.push(task),
            SchedulerPolicy::Lifo => tasks.insert(0, task),
        }
    }

    pub(super) fn remove(&self, task: &TaskRef) {
        let mut tasks = self.tasks.borrow_mut();
        if let Some(pos) = tasks.iter().position(|t| same_task(t, task)) {
            tasks.remove(pos);
        }
    }
}
