//! Platform publisher adapters for the Crosspost publishing queue.
//!
//! Provides the gateway-backed publisher used in production. The queue engine
//! only sees the [`Publisher`] trait; tests substitute their own mocks.

pub mod gateway;

pub use crosspost_core::publisher::{PublishOutcome, PublishRequest, Publisher};
pub use gateway::{GatewayConfig, GatewayPublisher};
