use std::cell::RefCell;
use std::rc::Rc;

/// Outcome of one task step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep the task in the run set; it runs again on a later turn.
    Continue,
    /// The task is finished and leaves the run set.
    Done,
}

impl From<bool> for Step {
    fn from(more: bool) -> Self {
        if more { Step::Continue } else { Step::Done }
    }
}

/// Error type for scheduler task steps.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task failed: {0}")]
    Failed(String),
    #[error("Task {0} re-entered its own step")]
    Reentrant(String),
}

/// A unit of cooperative work.
///
/// Each call to [`step`](Task::step) should do a bounded amount of work and
/// return. Tasks are shared by reference (`Rc<dyn Task>`) and compared by
/// identity, so state lives behind interior mutability.
pub trait Task {
    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "task"
    }

    fn step(&self) -> Result<Step, TaskError>;
}

/// Shared handle to a task; identity is the allocation.
pub type TaskRef = Rc<dyn Task>;

/// Whether two handles point at the same task.
pub fn same_task(a: &TaskRef, b: &TaskRef) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// Task driven by a callable; runs until it returns [`Step::Done`] or an error.
pub struct FnTask<F> {
    name: String,
    f: RefCell<F>,
}

impl<F> FnTask<F>
where
    F: FnMut() -> Result<Step, TaskError>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f: RefCell::new(f) }
    }
}

impl<F> Task for FnTask<F>
where
    F: FnMut() -> Result<Step, TaskError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self) -> Result<Step, TaskError> {
        let mut f = self
            .f
            .try_borrow_mut()
            .map_err(|_| TaskError::Reentrant(self.name.clone()))?;
        (*f)()
    }
}

/// Task driven by an iterator: each `next()` is one step, exhaustion is completion.
pub struct IterTask<I> {
    name: String,
    iter: RefCell<I>,
}

impl<I> IterTask<I>
where
    I: Iterator<Item = Step>,
{
    pub fn new(name: impl Into<String>, iter: I) -> Self {
        Self { name: name.into(), iter: RefCell::new(iter) }
    }
}

impl<I> Task for IterTask<I>
where
    I: Iterator<Item = Step>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self) -> Result<Step, TaskError> {
        let mut iter = self
            .iter
            .try_borrow_mut()
            .map_err(|_| TaskError::Reentrant(self.name.clone()))?;
        Ok(iter.next().unwrap_or(Step::Done))
    }
}

/// Task that runs a closure exactly once.
pub struct OnceTask<F> {
    name: String,
    f: RefCell<Option<F>>,
}

impl<F: FnOnce()> OnceTask<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f: RefCell::new(Some(f)) }
    }
}

impl<F: FnOnce()> Task for OnceTask<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self) -> Result<Step, TaskError> {
        let f = self
            .f
            .try_borrow_mut()
            .map_err(|_| TaskError::Reentrant(self.name.clone()))?
            .take();
        if let Some(f) = f {
            f();
        }
        Ok(Step::Done)
    }
}

pub fn fn_task<F>(name: impl Into<String>, f: F) -> TaskRef
where
    F: FnMut() -> Result<Step, TaskError> + 'static,
{
    Rc::new(FnTask::new(name, f))
}

pub fn iter_task<I>(name: impl Into<String>, iter: I) -> TaskRef
where
    I: Iterator<Item = Step> + 'static,
{
    Rc::new(IterTask::new(name, iter))
}

pub fn once_task<F>(name: impl Into<String>, f: F) -> TaskRef
where
    F: FnOnce() + 'static,
{
    Rc::new(OnceTask::new(name, f))
}
