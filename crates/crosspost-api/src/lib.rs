//! API server for the Crosspost publishing queue.
//!
//! Exposes the operator command surface (retry, bulk retry, manual publish,
//! cancel) and the filtered job listing over HTTP REST.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
