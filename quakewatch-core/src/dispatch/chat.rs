use super::{AlertChannel, DispatchError};
use crate::entities::ChannelKind;
use async_trait::async_trait;
use quakewatch_sdk::client::{ChatBotClient, MessagingClient};

/// Chat-bot transport. Identifiers are numeric chat ids.
pub struct ChatBotChannel {
    client: ChatBotClient,
}

impl ChatBotChannel {
    pub fn new(client: ChatBotClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlertChannel for ChatBotChannel {
    async fn send(&self, identifier: &str, message: &str) -> Result<(), DispatchError> {
        let chat_id: i64 =
            identifier
                .trim()
                .parse()
                .map_err(|_| DispatchError::InvalidIdentifier {
                    channel: ChannelKind::ChatBot,
                    identifier: identifier.to_string(),
                })?;

        self.client
            .send_message(chat_id, message)
            .await
            .map_err(|source| DispatchError::Client {
                channel: ChannelKind::ChatBot,
                identifier: identifier.to_string(),
                source,
            })
    }
}

/// Messaging-app transport. Identifiers are opaque, typically phone numbers.
pub struct MessagingAppChannel {
    client: MessagingClient,
}

impl MessagingAppChannel {
    pub fn new(client: MessagingClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlertChannel for MessagingAppChannel {
    async fn send(&self, identifier: &str, message: &str) -> Result<(), DispatchError> {
        if identifier.trim().is_empty() {
            return Err(DispatchError::InvalidIdentifier {
                channel: ChannelKind::MessagingApp,
                identifier: identifier.to_string(),
            });
        }

        self.client
            .send(identifier, message)
            .await
            .map_err(|source| DispatchError::Client {
                channel: ChannelKind::MessagingApp,
                identifier: identifier.to_string(),
                source,
            })
    }
}
