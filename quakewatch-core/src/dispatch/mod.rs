//! Outbound alert channels.
//!
//! Every transport implements [`AlertChannel`]. [`ChannelDispatcher`] holds
//! at most one implementation per [`ChannelKind`] and picks one by the
//! recipient's stored channel tag, never by inspecting types.

mod chat;
mod device_bus;

pub use chat::{ChatBotChannel, MessagingAppChannel};
pub use device_bus::{MqttDeviceBus, MqttSettings, RegistrationTopics, device_topic};

use crate::entities::ChannelKind;
use async_trait::async_trait;
use quakewatch_sdk::client::ClientError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while sending a single alert.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No transport is configured for this channel.
    #[error("{0} channel is not configured")]
    ChannelUnavailable(ChannelKind),

    /// The stored identifier cannot address this channel.
    #[error("invalid {channel} identifier {identifier:?}")]
    InvalidIdentifier {
        channel: ChannelKind,
        identifier: String,
    },

    /// HTTP delivery failed.
    #[error("failed to send {channel} message to {identifier}: {source}")]
    Client {
        channel: ChannelKind,
        identifier: String,
        source: ClientError,
    },

    /// The device bus refused the publish request.
    #[error("failed to publish to {topic}: {source}")]
    Publish {
        topic: String,
        source: rumqttc::ClientError,
    },

    /// The send did not settle within the configured bound.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// A transport able to deliver one text message to one identifier.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn send(&self, identifier: &str, message: &str) -> Result<(), DispatchError>;
}

/// Tells a freshly registered device which id it was given.
#[async_trait]
pub trait RegistrationAck: Send + Sync {
    async fn acknowledge(&self, device_id: &str) -> Result<(), DispatchError>;
}

/// Routes alerts to the transport registered for each [`ChannelKind`].
#[derive(Clone, Default)]
pub struct ChannelDispatcher {
    device_bus: Option<Arc<dyn AlertChannel>>,
    chat_bot: Option<Arc<dyn AlertChannel>>,
    messaging_app: Option<Arc<dyn AlertChannel>>,
}

impl ChannelDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_bus(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.device_bus = Some(channel);
        self
    }

    pub fn with_chat_bot(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.chat_bot = Some(channel);
        self
    }

    pub fn with_messaging_app(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.messaging_app = Some(channel);
        self
    }

    fn channel(&self, kind: ChannelKind) -> Option<&Arc<dyn AlertChannel>> {
        match kind {
            ChannelKind::DeviceBus => self.device_bus.as_ref(),
            ChannelKind::ChatBot => self.chat_bot.as_ref(),
            ChannelKind::MessagingApp => self.messaging_app.as_ref(),
        }
    }

    /// Send `message` to `identifier` over the `kind` transport.
    pub async fn send(
        &self,
        kind: ChannelKind,
        identifier: &str,
        message: &str,
    ) -> Result<(), DispatchError> {
        let Some(channel) = self.channel(kind) else {
            return Err(DispatchError::ChannelUnavailable(kind));
        };
        channel.send(identifier, message).await
    }
}
