pub mod config;
pub mod edit;
pub mod error;

pub use config::{MatcherConfig, SchedulerPolicy};
pub use edit::*;
pub use error::*;
