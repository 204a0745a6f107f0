//! Cooperative scheduler runner -- multiplexes tasks on one thread.
//!
//! Split into focused submodules:
//! - `core`: Scheduler handle, constructors, runnable listeners, accessors
//! - `scheduling`: Run-set edits, task selection, and sub-scheduler links
//! - `execution`: Single steps, draining, and the nested-scheduler task impl

mod core;
mod execution;
mod scheduling;

pub use self::core::{ListenerId, Scheduler};
