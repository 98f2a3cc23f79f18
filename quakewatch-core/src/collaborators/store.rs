use crate::entities::{EarthquakeEvent, GetLatestEarthquakeIdentity, InsertEarthquakeRecord};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while persisting events.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("raw report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable record of fetched events.
///
/// Writes are best-effort from the worker's point of view: a failure is
/// logged and does not block notification.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn save_event(&self, event: &EarthquakeEvent) -> Result<(), StoreError>;

    /// Identity of the most recently stored event.
    async fn latest_identity(&self) -> Result<Option<String>, StoreError>;
}

/// Postgres-backed event store.
pub struct PgEventStore {
    db: DatabaseProcessor,
}

impl PgEventStore {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn save_event(&self, event: &EarthquakeEvent) -> Result<(), StoreError> {
        let insert = InsertEarthquakeRecord::from_event(event)?;
        let id = self.db.process(insert).await?;
        debug!(record_id = id, identity = %event.identity(), "Stored earthquake record");
        Ok(())
    }

    async fn latest_identity(&self) -> Result<Option<String>, StoreError> {
        Ok(self.db.process(GetLatestEarthquakeIdentity).await?)
    }
}
