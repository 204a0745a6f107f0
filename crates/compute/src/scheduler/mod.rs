//! Cooperative, single-threaded task scheduling.
//!
//! A [`Scheduler`] holds a run set of [`Task`]s and advances exactly one of
//! them per [`run_one_step`](Scheduler::run_one_step). Suspension happens only
//! between steps, never inside one. Schedulers nest: a child scheduler is
//! itself a task in its parent's run set. [`MainLoop`] is the host-side tick
//! source that drives a root scheduler and runs deferred callables.

pub mod main_loop;
pub mod runner;
pub mod task;

pub use main_loop::{HostLoop, IdleCallback, MainLoop};
pub use runner::{ListenerId, Scheduler};
pub use task::{
    fn_task, iter_task, once_task, same_task, FnTask, IterTask, OnceTask, Step, Task, TaskError,
    TaskRef,
};
