//! Background diff computation for the mergeline viewer.
//!
//! Character-level matches run on worker threads; results flow back to the
//! single interactive thread through a [`MatchCoordinator`], which caches
//! them and delivers callbacks as steps of a cooperative [`Scheduler`].

pub mod cache;
pub mod coordinator;
pub mod matcher;
pub mod metrics;
pub mod scheduler;
pub mod worker;

mod unwind;

pub use cache::ResultCache;
pub use coordinator::{MatchCallback, MatchCoordinator};
pub use matcher::{InlineMatcher, MatchError, SequenceMatcher};
pub use metrics::MatchMetrics;
pub use scheduler::{HostLoop, MainLoop, Scheduler, Step, Task, TaskError, TaskRef};
pub use worker::{JobId, JobResult, MatchKey, PoolError, WorkerPool};
