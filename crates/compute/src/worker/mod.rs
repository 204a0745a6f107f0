//! Off-thread diff computation.
//!
//! A [`WorkerPool`] owns a set of worker threads that pull [`WorkerMessage`]s
//! from one unbounded job queue and push [`JobResult`]s into one bounded
//! result queue. The queues are the only state shared with the caller.

pub mod pool;
pub mod types;

pub use pool::WorkerPool;
pub use types::{Job, JobId, JobResult, MatchKey, PoolError, WorkerMessage};
