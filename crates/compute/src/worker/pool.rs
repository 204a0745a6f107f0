use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use mergeline_core::MatcherConfig;

use super::types::{Job, JobId, JobResult, MatchKey, PoolError, WorkerMessage};
use crate::matcher::{MatchError, SequenceMatcher};
use crate::unwind;

/// How often shutdown re-checks whether workers have exited.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    /// Created, threads not spawned yet. Jobs already queue up.
    Idle,
    Running,
    Stopped,
}

/// Pool of matcher threads fed through an unbounded job queue and drained
/// through a bounded result queue.
///
/// The bounded result queue makes workers block once a handful of results
/// are waiting, so results surface to the consumer incrementally instead of
/// piling up behind a long backlog.
pub struct WorkerPool {
    matcher: Arc<dyn SequenceMatcher>,
    num_workers: usize,
    shutdown_grace: Duration,
    state: PoolState,
    next_job_id: JobId,
    jobs_tx: Option<Sender<WorkerMessage>>,
    jobs_rx: Arc<Mutex<Receiver<WorkerMessage>>>,
    /// Handed to workers on start; `None` once they own all senders.
    results_tx: Option<SyncSender<JobResult>>,
    results_rx: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool. Threads are not spawned until [`start`](Self::start)
    /// or the first [`submit`](Self::submit).
    pub fn new(matcher: Arc<dyn SequenceMatcher>, config: &MatcherConfig) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (results_tx, results_rx) = mpsc::sync_channel(config.result_queue_capacity.max(1));
        Self {
            matcher,
            num_workers: config.resolved_worker_threads(),
            shutdown_grace: config.shutdown_grace(),
            state: PoolState::Idle,
            next_job_id: 1,
            jobs_tx: Some(jobs_tx),
            jobs_rx: Arc::new(Mutex::new(jobs_rx)),
            results_tx: Some(results_tx),
            results_rx,
            workers: Vec::new(),
        }
    }

    /// Spawn the worker threads. No-op if already running.
    pub fn start(&mut self) -> Result<(), PoolError> {
        match self.state {
            PoolState::Running => return Ok(()),
            PoolState::Stopped => return Err(PoolError::ShutDown),
            PoolState::Idle => {}
        }
        let Some(results_tx) = self.results_tx.take() else {
            return Err(PoolError::ShutDown);
        };

        for index in 0..self.num_workers {
            let matcher = Arc::clone(&self.matcher);
            let jobs = Arc::clone(&self.jobs_rx);
            let results = results_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("mergeline-worker-{index}"))
                .spawn(move || worker_loop(index, matcher, jobs, results))?;
            self.workers.push(handle);
        }

        self.state = PoolState::Running;
        info!(
            "Worker pool started with {} workers (matcher: {})",
            self.num_workers,
            self.matcher.name()
        );
        Ok(())
    }

    /// Queue a job for `key` and return its id. Never blocks.
    pub fn submit(&mut self, key: MatchKey) -> Result<JobId, PoolError> {
        if self.state == PoolState::Idle {
            self.start()?;
        }
        let jobs_tx = self.jobs_tx.as_ref().ok_or(PoolError::ShutDown)?;

        let id = self.next_job_id;
        jobs_tx
            .send(WorkerMessage::Job(Job { id, key }))
            .map_err(|_| PoolError::ShutDown)?;
        self.next_job_id += 1;
        debug!(job_id = id, "Submitted match job");
        Ok(id)
    }

    /// Wait at most `timeout` for one completed result.
    pub fn poll(&self, timeout: Duration) -> Option<JobResult> {
        match self.results_rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Stop all workers.
    ///
    /// Each worker gets a terminate message and up to the grace period to
    /// exit. Workers still busy after that are detached; once the queues are
    /// disconnected they exit at their next send or receive.
    pub fn shutdown(&mut self) {
        if self.state == PoolState::Stopped {
            return;
        }
        self.state = PoolState::Stopped;
        self.results_tx = None;

        if let Some(jobs_tx) = self.jobs_tx.take() {
            for _ in 0..self.workers.len() {
                let _ = jobs_tx.send(WorkerMessage::Terminate);
            }
        }

        let deadline = Instant::now() + self.shutdown_grace;
        let mut discarded = 0usize;
        for (index, handle) in self.workers.drain(..).enumerate() {
            while !handle.is_finished() && Instant::now() < deadline {
                // Free up result slots so blocked workers can reach the terminate message.
                while self.results_rx.try_recv().is_ok() {
                    discarded += 1;
                }
                thread::sleep(JOIN_POLL_INTERVAL);
            }

            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!(worker = index, "Worker thread panicked before shutdown");
                }
            } else {
                warn!(
                    worker = index,
                    grace = ?self.shutdown_grace,
                    "Worker did not exit within grace period, abandoning it"
                );
            }
        }

        if discarded > 0 {
            debug!(discarded, "Dropped undelivered results during shutdown");
        }
        info!("Worker pool stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state == PoolState::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PoolState::Stopped
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Id the next submitted job will get.
    pub fn next_job_id(&self) -> JobId {
        self.next_job_id
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    index: usize,
    matcher: Arc<dyn SequenceMatcher>,
    jobs: Arc<Mutex<Receiver<WorkerMessage>>>,
    results: SyncSender<JobResult>,
) {
    debug!(worker = index, "Worker started");
    loop {
        let message = {
            let rx = jobs.lock().unwrap_or_else(PoisonError::into_inner);
            rx.recv()
        };

        let job = match message {
            Ok(WorkerMessage::Job(job)) => job,
            Ok(WorkerMessage::Terminate) => break,
            // Pool dropped its sender without a terminate message.
            Err(_) => break,
        };

        let start = Instant::now();
        let outcome = unwind::catch(|| matcher.edits(&job.key.text_a, &job.key.text_b))
            .unwrap_or_else(|msg| Err(MatchError::Panicked(msg)));

        match outcome {
            Ok(edits) => {
                let result = JobResult {
                    job_id: job.id,
                    edits,
                    elapsed: start.elapsed(),
                };
                if results.send(result).is_err() {
                    debug!(worker = index, "Result queue closed, worker exiting");
                    break;
                }
            }
            Err(e) => {
                error!(worker = index, job_id = job.id, "Exception while running diff: {}", e);
            }
        }
        thread::yield_now();
    }
    debug!(worker = index, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::InlineMatcher;
    use mergeline_core::{EditScript, EditTag};

    const WAIT: Duration = Duration::from_secs(5);

    /// Matcher that fails on a marker input and sleeps on another.
    struct ScriptedMatcher;

    impl SequenceMatcher for ScriptedMatcher {
        fn name(&self) -> &str {
            "scripted"
        }

        fn edits(&self, text_a: &str, text_b: &str) -> Result<EditScript, MatchError> {
            match text_a {
                "fail" => Err(MatchError::Failed("scripted failure".into())),
                "panic" => panic!("scripted panic"),
                "slow" => {
                    thread::sleep(Duration::from_millis(500));
                    InlineMatcher::new().edits(text_a, text_b)
                }
                _ => InlineMatcher::new().edits(text_a, text_b),
            }
        }
    }

    fn pool(workers: usize) -> WorkerPool {
        let config = MatcherConfig {
            worker_threads: workers,
            shutdown_grace_ms: 50,
            ..MatcherConfig::default()
        };
        WorkerPool::new(Arc::new(ScriptedMatcher), &config)
    }

    fn poll_until(pool: &WorkerPool) -> Option<JobResult> {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if let Some(r) = pool.poll(Duration::from_millis(10)) {
                return Some(r);
            }
        }
        None
    }

    #[test]
    fn job_ids_start_at_one_and_increase() {
        let mut pool = pool(1);
        assert_eq!(pool.submit(MatchKey::new("a", "b")).unwrap(), 1);
        assert_eq!(pool.submit(MatchKey::new("a", "c")).unwrap(), 2);
        assert_eq!(pool.next_job_id(), 3);
        assert!(pool.is_running(), "submit starts an idle pool");
    }

    #[test]
    fn submitted_job_produces_result() {
        let mut pool = pool(1);
        let id = pool.submit(MatchKey::new("abc", "abd")).unwrap();
        let result = poll_until(&pool).expect("result");
        assert_eq!(result.job_id, id);
        assert_eq!(result.edits.last().unwrap().tag, EditTag::Replace);
    }

    #[test]
    fn poll_times_out_without_work() {
        let mut pool = pool(1);
        pool.start().unwrap();
        let start = Instant::now();
        assert!(pool.poll(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn failed_and_panicking_jobs_are_dropped() {
        let mut pool = pool(1);
        pool.submit(MatchKey::new("fail", "x")).unwrap();
        pool.submit(MatchKey::new("panic", "x")).unwrap();
        let ok = pool.submit(MatchKey::new("fine", "fine!")).unwrap();

        let result = poll_until(&pool).expect("worker survives bad jobs");
        assert_eq!(result.job_id, ok);
        assert!(pool.poll(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn all_jobs_answered_across_workers() {
        let mut pool = pool(3);
        let mut ids: Vec<JobId> = (0..12)
            .map(|i| pool.submit(MatchKey::new(&format!("line {i}"), "line x")).unwrap())
            .collect();
        let mut seen: Vec<JobId> = (0..12).filter_map(|_| poll_until(&pool)).map(|r| r.job_id).collect();
        ids.sort_unstable();
        seen.sort_unstable();
        assert_eq!(ids, seen);
    }

    #[test]
    fn shutdown_is_bounded_by_grace_period() {
        let mut pool = pool(1);
        pool.submit(MatchKey::new("slow", "x")).unwrap();
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        pool.shutdown();
        assert!(start.elapsed() < Duration::from_millis(400));
        assert!(pool.is_stopped());
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let mut pool = pool(1);
        pool.start().unwrap();
        pool.shutdown();
        assert!(matches!(pool.submit(MatchKey::new("a", "b")), Err(PoolError::ShutDown)));
        assert!(matches!(pool.start(), Err(PoolError::ShutDown)));
    }

    #[test]
    fn shutdown_of_idle_pool_is_quick() {
        let mut pool = pool(2);
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_stopped());
    }
}
