//! Publishing queue engine for Crosspost.
//!
//! Owns the job lifecycle and the operator-facing recovery commands, and runs
//! the worker that dispatches scheduled jobs once they come due. All mutation
//! flows through one guarded dispatch path so operator-triggered and
//! automatic deliveries cannot drift apart.

pub mod engine;
pub mod worker;

pub use engine::{BulkRetryReport, DispatchMode, QueueEngine};
pub use worker::QueueWorker;
