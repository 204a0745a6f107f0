use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MergelineError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.parse().ok())
}

// ── Scheduler policy ──────────────────────────────────────────

/// Order in which a cooperative scheduler picks its next task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerPolicy {
    /// Oldest-added task runs first.
    #[default]
    Fifo,
    /// Most-recently-added task runs first.
    Lifo,
}

impl FromStr for SchedulerPolicy {
    type Err = MergelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(SchedulerPolicy::Fifo),
            "lifo" => Ok(SchedulerPolicy::Lifo),
            other => Err(MergelineError::InvalidConfig(format!(
                "unknown scheduler policy '{other}', expected 'fifo' or 'lifo'"
            ))),
        }
    }
}

impl fmt::Display for SchedulerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerPolicy::Fifo => f.write_str("fifo"),
            SchedulerPolicy::Lifo => f.write_str("lifo"),
        }
    }
}

// ── Matcher config ────────────────────────────────────────────

/// Settings for the background matcher: worker pool, result draining and
/// scheduling. Typically parsed from TOML, with `MERGELINE_*` env overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Capacity of the bounded result queue between workers and the drain task.
    #[serde(default = "default_result_queue_capacity")]
    pub result_queue_capacity: usize,
    /// How long one drain step may wait for a result, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// How long shutdown waits for each worker before abandoning it, in milliseconds.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Task selection order for schedulers created from this config.
    #[serde(default)]
    pub scheduler_policy: SchedulerPolicy,
    /// Suggested minimum number of cached results kept by `clean`. 0 = caller decides.
    #[serde(default)]
    pub cache_size_hint: usize,
    /// Longest input, in characters, the inline matcher accepts. 0 = no limit.
    #[serde(default)]
    pub max_input_chars: usize,
}

fn default_worker_threads() -> usize { 1 }
fn default_result_queue_capacity() -> usize { 5 }
fn default_poll_timeout_ms() -> u64 { 10 }
fn default_shutdown_grace_ms() -> u64 { 1000 }

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            result_queue_capacity: default_result_queue_capacity(),
            poll_timeout_ms: default_poll_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            scheduler_policy: SchedulerPolicy::default(),
            cache_size_hint: 0,
            max_input_chars: 0,
        }
    }
}

impl MatcherConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, MergelineError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MergelineError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Build config from defaults plus environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, MergelineError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply env overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, MergelineError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `MERGELINE_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), MergelineError> {
        if let Some(v) = env_parse("MERGELINE_WORKER_THREADS") {
            self.worker_threads = v;
        }
        if let Some(v) = env_parse("MERGELINE_RESULT_QUEUE_CAPACITY") {
            self.result_queue_capacity = v;
        }
        if let Some(v) = env_parse("MERGELINE_POLL_TIMEOUT_MS") {
            self.poll_timeout_ms = v;
        }
        if let Some(v) = env_parse("MERGELINE_SHUTDOWN_GRACE_MS") {
            self.shutdown_grace_ms = v;
        }
        if let Some(v) = env_parse("MERGELINE_CACHE_SIZE_HINT") {
            self.cache_size_hint = v;
        }
        if let Some(v) = env_parse("MERGELINE_MAX_INPUT_CHARS") {
            self.max_input_chars = v;
        }
        if let Some(v) = env_opt("MERGELINE_SCHEDULER_POLICY") {
            self.scheduler_policy = v.parse()?;
        }
        Ok(())
    }

    /// Reject settings the worker pool cannot run with.
    pub fn validate(&self) -> Result<(), MergelineError> {
        if self.result_queue_capacity == 0 {
            return Err(MergelineError::InvalidConfig(
                "result_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            workers = self.resolved_worker_threads(),
            result_queue = self.result_queue_capacity,
            poll_timeout_ms = self.poll_timeout_ms,
            shutdown_grace_ms = self.shutdown_grace_ms,
            max_input_chars = self.max_input_chars,
            policy = %self.scheduler_policy,
            "Matcher config loaded"
        );
    }
}
