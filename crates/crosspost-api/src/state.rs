//! Application state.

use std::sync::Arc;

use crosspost_core::Publisher;
use crosspost_db::{JobRepo, PgJobRepo};
use crosspost_queue::QueueEngine;
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn JobRepo>,
    pub engine: Arc<QueueEngine>,
}

impl AppState {
    pub fn new(pool: PgPool, publisher: Arc<dyn Publisher>) -> Self {
        let repo: Arc<dyn JobRepo> = Arc::new(PgJobRepo::new(pool));
        let engine = Arc::new(QueueEngine::new(repo.clone(), publisher));
        Self { repo, engine }
    }
}
