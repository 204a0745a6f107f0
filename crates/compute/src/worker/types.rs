use std::sync::Arc;
use std::time::Duration;

use mergeline_core::EditScript;

/// Identifier of one submitted job. Starts at 1 for every new pool.
pub type JobId = u64;

/// The input pair a match is computed for; also the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub text_a: Arc<str>,
    pub text_b: Arc<str>,
}

impl MatchKey {
    pub fn new(text_a: &str, text_b: &str) -> Self {
        Self {
            text_a: Arc::from(text_a),
            text_b: Arc::from(text_b),
        }
    }
}

/// One unit of off-thread diff work.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub key: MatchKey,
}

/// Message on the inbound job queue.
#[derive(Debug)]
pub enum WorkerMessage {
    Job(Job),
    /// Tells the receiving worker to exit its loop.
    Terminate,
}

/// Completed job, posted exactly once per successful [`Job`].
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: JobId,
    pub edits: EditScript,
    /// Time the matcher spent on this job.
    pub elapsed: Duration,
}

/// Error type for worker pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool has been shut down")]
    ShutDown,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
