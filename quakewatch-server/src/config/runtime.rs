//! Validated runtime configuration.
//!
//! Built from [`FileConfig`](super::file::FileConfig) by the
//! [`ConfigLoader`](super::ConfigLoader). Only `ingestion` and `notifier`
//! are swapped on SIGHUP; connection and registration settings need a
//! restart.

use quakewatch_core::config::{ChatRegistrationSettings, IngestionSettings, NotifierSettings};
use quakewatch_core::dispatch::MqttSettings;
use std::net::SocketAddr;
use url::Url;

#[derive(Debug, Clone)]
pub struct ChatBotSettings {
    pub api_base: Url,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct MessagingAppSettings {
    pub endpoint: Url,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub listen: SocketAddr,
    pub feed_url: Url,
    pub ingestion: IngestionSettings,
    pub notifier: NotifierSettings,
    pub mqtt: MqttSettings,
    pub chat_bot: Option<ChatBotSettings>,
    pub messaging_app: Option<MessagingAppSettings>,
    /// `None` when chat-bot registration is disabled or no bot is configured.
    pub chat_registration: Option<ChatRegistrationSettings>,
}
