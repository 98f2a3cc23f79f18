use async_trait::async_trait;
use quakewatch_sdk::client::{ChatBotClient, ClientError};
use quakewatch_sdk::objects::{SendMessageRequest, Update};
use std::time::Duration;

/// Incoming messages to the chat bot, and replies to them.
#[async_trait]
pub trait ChatBotInbox: Send + Sync {
    /// Wait up to `wait` for updates after `offset`.
    async fn poll(&self, offset: Option<i64>, wait: Duration) -> Result<Vec<Update>, ClientError>;

    async fn reply(&self, request: &SendMessageRequest) -> Result<(), ClientError>;
}

#[async_trait]
impl ChatBotInbox for ChatBotClient {
    async fn poll(&self, offset: Option<i64>, wait: Duration) -> Result<Vec<Update>, ClientError> {
        self.get_updates(offset, wait.as_secs()).await
    }

    async fn reply(&self, request: &SendMessageRequest) -> Result<(), ClientError> {
        self.send(request).await
    }
}
