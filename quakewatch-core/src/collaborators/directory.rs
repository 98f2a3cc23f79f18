use crate::entities::{
    DeviceRecord, InsertDeviceRecord, ListDeviceRecords, ListUserRecords, UpsertChatBotUser,
    UserRecord,
};
use crate::framework::DatabaseProcessor;
use crate::geo::Coordinate;
use async_trait::async_trait;
use kanau::processor::Processor;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while reading or writing recipients.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read access to registered devices and users.
///
/// Records are read fresh on every evaluation; nothing is cached.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, DirectoryError>;
    async fn list_users(&self) -> Result<Vec<UserRecord>, DirectoryError>;
}

/// Write access used by the self-registration flows.
#[async_trait]
pub trait RecipientRegistry: Send + Sync {
    /// Store a new device at `location` and return the id it was given.
    async fn register_device(&self, location: Coordinate) -> Result<String, DirectoryError>;

    /// Create the chat-bot subscriber `chat_id`, or move it to `location`.
    async fn register_chat_user(&self, chat_id: i64, location: Coordinate) -> Result<(), DirectoryError>;
}

/// Postgres-backed recipient directory.
pub struct PgDirectory {
    db: DatabaseProcessor,
}

impl PgDirectory {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecipientDirectory for PgDirectory {
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, DirectoryError> {
        Ok(self.db.process(ListDeviceRecords).await?)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        Ok(self.db.process(ListUserRecords).await?)
    }
}

#[async_trait]
impl RecipientRegistry for PgDirectory {
    async fn register_device(&self, location: Coordinate) -> Result<String, DirectoryError> {
        let id = Uuid::now_v7().to_string();
        self.db
            .process(InsertDeviceRecord {
                id: id.clone(),
                location,
            })
            .await?;
        Ok(id)
    }

    async fn register_chat_user(&self, chat_id: i64, location: Coordinate) -> Result<(), DirectoryError> {
        self.db
            .process(UpsertChatBotUser {
                id: Uuid::now_v7().to_string(),
                chat_id,
                location,
            })
            .await?;
        Ok(())
    }
}
