//! Core domain types and traits for the Crosspost publishing queue.
//!
//! This crate contains:
//! - Resource identifiers and common types
//! - The publishing job entity and its status state machine
//! - The platform publisher trait and outcome types
//! - The authenticated owner context passed into every operation

pub mod context;
pub mod error;
pub mod id;
pub mod job;
pub mod publisher;

pub use context::OwnerContext;
pub use error::{Error, Result};
pub use id::ResourceId;
pub use job::{JobFilter, JobStatus, Platform, PublishPayload, PublishingJob};
pub use publisher::{PublishOutcome, PublishRequest, Publisher};
