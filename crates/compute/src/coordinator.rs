//! Façade over the worker pool and result cache.
//!
//! [`MatchCoordinator`] lives on the interactive thread. Cache hits are
//! answered through a one-shot scheduler task; misses become worker jobs,
//! and a single drain task polls the result queue once per scheduler turn
//! until every pending request is answered.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, error, info, trace};

use mergeline_core::{EditOp, MatcherConfig};

use crate::cache::ResultCache;
use crate::matcher::SequenceMatcher;
use crate::metrics::MatchMetrics;
use crate::scheduler::{once_task, HostLoop, Scheduler, Step, Task, TaskError, TaskRef};
use crate::unwind;
use crate::worker::{JobId, JobResult, MatchKey, PoolError, WorkerPool};

/// Receives the edit script for one `match_texts` call.
pub type MatchCallback = Box<dyn FnOnce(Rc<[EditOp]>)>;

struct PendingRequest {
    key: MatchKey,
    /// The first caller plus any de-duplicated callers for the same key.
    callbacks: Vec<MatchCallback>,
}

struct CoordinatorInner {
    config: MatcherConfig,
    matcher: Arc<dyn SequenceMatcher>,
    scheduler: Scheduler,
    pool: RefCell<WorkerPool>,
    cache: RefCell<ResultCache<MatchKey, Rc<[EditOp]>>>,
    pending: RefCell<HashMap<JobId, PendingRequest>>,
    in_flight: RefCell<HashMap<MatchKey, JobId>>,
    metrics: RefCell<MatchMetrics>,
    drain_task: TaskRef,
}

/// Scheduler task that drains the result queue while requests are pending.
struct DrainTask {
    coordinator: Weak<CoordinatorInner>,
}

impl Task for DrainTask {
    fn name(&self) -> &str {
        "match-drain"
    }

    fn step(&self) -> Result<Step, TaskError> {
        match self.coordinator.upgrade() {
            Some(inner) => Ok(inner.drain_step()),
            None => Ok(Step::Done),
        }
    }
}

/// Asynchronous, cached diff service for the interactive thread.
///
/// Cloning yields another handle to the same coordinator.
#[derive(Clone)]
pub struct MatchCoordinator {
    inner: Rc<CoordinatorInner>,
}

impl MatchCoordinator {
    /// Create a coordinator whose callbacks run on `scheduler`.
    ///
    /// Worker threads are started from an idle callback on `host`, so
    /// construction never waits on thread spawning.
    pub fn new(
        scheduler: Scheduler,
        host: &dyn HostLoop,
        matcher: Arc<dyn SequenceMatcher>,
        config: MatcherConfig,
    ) -> Self {
        let pool = WorkerPool::new(Arc::clone(&matcher), &config);
        let inner = Rc::new_cyclic(|weak: &Weak<CoordinatorInner>| CoordinatorInner {
            config,
            matcher,
            scheduler,
            pool: RefCell::new(pool),
            cache: RefCell::new(ResultCache::new()),
            pending: RefCell::new(HashMap::new()),
            in_flight: RefCell::new(HashMap::new()),
            metrics: RefCell::new(MatchMetrics::default()),
            drain_task: Rc::new(DrainTask { coordinator: weak.clone() }),
        });

        let weak = Rc::downgrade(&inner);
        host.idle_add(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Err(e) = inner.pool.borrow_mut().start() {
                    error!("Failed to start worker pool: {}", e);
                }
            }
        }));

        Self { inner }
    }

    /// Request the edit script between `text_a` and `text_b`.
    ///
    /// `callback` always runs from a later scheduler step, never inline. A
    /// request for texts already being matched joins the existing job. If
    /// the matcher fails on this pair the callback never runs.
    pub fn match_texts(
        &self,
        text_a: &str,
        text_b: &str,
        callback: impl FnOnce(Rc<[EditOp]>) + 'static,
    ) -> Result<(), PoolError> {
        let inner = &self.inner;
        let key = MatchKey::new(text_a, text_b);

        let cached = inner.cache.borrow_mut().get(&key);
        if let Some(edits) = cached {
            inner.metrics.borrow_mut().cache_hits += 1;
            trace!("Match served from cache");
            inner
                .scheduler
                .add_task(once_task("cached-match", move || callback(edits)));
            return Ok(());
        }
        inner.metrics.borrow_mut().cache_misses += 1;

        let existing = inner.in_flight.borrow().get(&key).copied();
        if let Some(job_id) = existing {
            if let Some(request) = inner.pending.borrow_mut().get_mut(&job_id) {
                request.callbacks.push(Box::new(callback));
                inner.metrics.borrow_mut().deduplicated += 1;
                debug!(job_id, "Joined in-flight match job");
                return Ok(());
            }
        }

        let job_id = inner.pool.borrow_mut().submit(key.clone())?;
        inner.metrics.borrow_mut().jobs_submitted += 1;

        let was_idle = inner.pending.borrow().is_empty();
        inner.in_flight.borrow_mut().insert(key.clone(), job_id);
        inner.pending.borrow_mut().insert(
            job_id,
            PendingRequest {
                key,
                callbacks: vec![Box::new(callback)],
            },
        );
        if was_idle {
            inner.scheduler.add_task(Rc::clone(&inner.drain_task));
        }
        Ok(())
    }

    /// Evict cached results down to roughly `2 * size_hint` entries once the
    /// cache exceeds `3 * size_hint`. Returns the number evicted.
    pub fn clean(&self, size_hint: usize) -> usize {
        let evicted = self.inner.cache.borrow_mut().evict(size_hint);
        self.inner.metrics.borrow_mut().evicted += evicted as u64;
        evicted
    }

    /// Shut down the workers and forget all state.
    ///
    /// The next `match_texts` call runs against a fresh pool whose job ids
    /// start over. Callbacks of unanswered requests are dropped without
    /// running; results still in flight are discarded.
    pub fn stop(&self) {
        let inner = &self.inner;
        let fresh = WorkerPool::new(Arc::clone(&inner.matcher), &inner.config);
        let mut old = inner.pool.replace(fresh);
        old.shutdown();

        let dropped = std::mem::take(&mut *inner.pending.borrow_mut());
        inner.in_flight.borrow_mut().clear();
        inner.cache.borrow_mut().clear();
        inner.scheduler.remove_task(&inner.drain_task);

        if !dropped.is_empty() {
            info!(pending = dropped.len(), "Discarded unanswered match requests");
        }
        drop(dropped);
    }

    /// Snapshot of the coordinator's counters.
    pub fn metrics(&self) -> MatchMetrics {
        let mut snapshot = self.inner.metrics.borrow().clone();
        snapshot.cache_entries = self.inner.cache.borrow().len();
        snapshot.pending_jobs = self.inner.pending.borrow().len();
        snapshot
    }

    /// Ids of jobs still waiting for a result, ascending.
    pub fn pending_jobs(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.inner.pending.borrow().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.pending.borrow().is_empty()
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }
}

impl CoordinatorInner {
    /// One turn of the drain task: poll once, deliver whatever arrived.
    fn drain_step(&self) -> Step {
        let result = self.pool.borrow().poll(self.config.poll_timeout());
        if let Some(result) = result {
            self.resolve(result);
        }
        Step::from(!self.pending.borrow().is_empty())
    }

    fn resolve(&self, result: JobResult) {
        let job_id = result.job_id;
        let request = self.pending.borrow_mut().remove(&job_id);
        let Some(request) = request else {
            self.metrics.borrow_mut().orphaned_results += 1;
            debug!(job_id, "Dropping result with no pending request");
            return;
        };

        self.in_flight.borrow_mut().remove(&request.key);
        let edits: Rc<[EditOp]> = result.edits.into();
        self.cache.borrow_mut().put(request.key, Rc::clone(&edits));
        self.metrics.borrow_mut().record_result(result.elapsed);
        trace!(job_id, callbacks = request.callbacks.len(), "Delivering match result");

        // No borrows are held here: callbacks may issue new matches.
        for callback in request.callbacks {
            let edits = Rc::clone(&edits);
            if let Err(msg) = unwind::catch(move || callback(edits)) {
                error!(job_id, "Match callback panicked: {}", msg);
            }
        }
    }
}
