use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Coordinator counters, serialized for `--stats` output.
#[derive(Debug, Clone, Serialize)]
pub struct MatchMetrics {
    /// Jobs handed to the worker pool.
    pub jobs_submitted: u64,
    /// Requests answered from the result cache.
    pub cache_hits: u64,
    /// Requests that needed a worker (including de-duplicated ones).
    pub cache_misses: u64,
    /// Requests attached to a job already in flight for the same texts.
    pub deduplicated: u64,
    /// Results taken off the result queue and delivered.
    pub results_drained: u64,
    /// Results whose job id had no pending request.
    pub orphaned_results: u64,
    /// Cache entries removed by `clean`.
    pub evicted: u64,
    /// Mean worker-side time per match.
    pub avg_match_duration: Duration,
    /// Cache size at the time of the snapshot.
    pub cache_entries: usize,
    /// Requests still waiting for a result at the time of the snapshot.
    pub pending_jobs: usize,
    pub started_at: DateTime<Utc>,
    pub last_result_at: Option<DateTime<Utc>>,
}

impl Default for MatchMetrics {
    fn default() -> Self {
        Self {
            jobs_submitted: 0,
            cache_hits: 0,
            cache_misses: 0,
            deduplicated: 0,
            results_drained: 0,
            orphaned_results: 0,
            evicted: 0,
            avg_match_duration: Duration::ZERO,
            cache_entries: 0,
            pending_jobs: 0,
            started_at: Utc::now(),
            last_result_at: None,
        }
    }
}

impl MatchMetrics {
    /// Record a delivered worker result.
    pub fn record_result(&mut self, duration: Duration) {
        self.results_drained += 1;
        self.last_result_at = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let count = self.results_drained;
        self.avg_match_duration = if count == 1 {
            duration
        } else {
            let prev = self.avg_match_duration.as_nanos() as f64;
            let cur = duration.as_nanos() as f64;
            Duration::from_nanos((prev + (cur - prev) / count as f64) as u64)
        };
    }

    /// Fraction of requests served from the cache, 0.0 when nothing was asked.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
