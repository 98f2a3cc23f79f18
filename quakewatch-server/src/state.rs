//! Application state shared across all request handlers.

use quakewatch_core::processors::WorkerState;
use sqlx::PgPool;
use tokio::sync::watch;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Latest state published by the ingestion worker.
    pub worker_state: watch::Receiver<WorkerState>,
}

impl AppState {
    pub fn new(db: PgPool, worker_state: watch::Receiver<WorkerState>) -> Self {
        Self { db, worker_state }
    }

    pub fn worker_state(&self) -> WorkerState {
        *self.worker_state.borrow()
    }
}
