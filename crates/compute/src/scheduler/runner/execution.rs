use tracing::{error, trace, warn};

use crate::scheduler::task::{Step, Task, TaskError};
use crate::unwind;

use super::core::{Scheduler, SchedulerInner};

impl Scheduler {
    /// Run one step of the current task.
    ///
    /// The task is removed if it reports [`Step::Done`], returns an error, or
    /// panics; errors and panics are logged and go no further. A task that
    /// continues yields its turn, so continuing tasks take turns in policy
    /// order. Returns whether tasks remain. An empty run set is a no-op.
    pub fn run_one_step(&self) -> bool {
        self.inner.run_one_step()
    }

    /// Step tasks until the run set is empty. Blocks the calling thread.
    pub fn run_to_completion(&self) {
        while self.inner.has_pending() {
            self.inner.run_one_step();
        }
    }
}

impl SchedulerInner {
    pub(super) fn run_one_step(&self) -> bool {
        let Some(task) = self.current_task() else {
            return false;
        };

        // No borrow of the run set is held here: the task may add or remove
        // tasks, including itself.
        let finished = match unwind::catch(|| task.step()) {
            Ok(Ok(Step::Continue)) => false,
            Ok(Ok(Step::Done)) => {
                trace!(scheduler = %self.name, task = task.name(), "Task finished");
                true
            }
            Ok(Err(e)) => {
                warn!(scheduler = %self.name, task = task.name(), "Task failed, removing it: {}", e);
                true
            }
            Err(msg) => {
                error!(scheduler = %self.name, task = task.name(), "Task panicked, removing it: {}", msg);
                true
            }
        };

        if finished {
            self.remove(&task);
        } else {
            self.yield_turn(&task);
        }
        self.has_pending()
    }
}

/// A nested scheduler runs one of its own steps per step of its parent and
/// stays runnable while it has tasks.
impl Task for SchedulerInner {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self) -> Result<Step, TaskError> {
        Ok(Step::from(self.run_one_step()))
    }
}
