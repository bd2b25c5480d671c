//! Repository traits and implementations.

pub mod job;
pub mod memory;
pub mod pg;

pub use job::{JobRepo, JobUpdate};
pub use memory::MemoryJobRepo;
pub use pg::PgJobRepo;
