//! TOML file configuration structures.
//!
//! These structs directly map to the `quakewatch.toml` file format.

use quakewatch_core::config::FailurePolicy;
use quakewatch_sdk::client::{DEFAULT_BOT_API_BASE, DEFAULT_FEED_URL};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    pub mqtt: MqttConfig,
    /// Users preferring an unconfigured channel fail with `ChannelUnavailable`.
    pub chat_bot: Option<ChatBotConfig>,
    pub messaging_app: Option<MessagingAppConfig>,
    #[serde(default)]
    pub registration: RegistrationConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Upstream feed and polling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Do not store or notify a report identical to the previous one.
    pub skip_unchanged: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            interval_secs: 5,
            fetch_timeout_secs: 5,
            skip_unchanged: true,
        }
    }
}

/// Fan-out behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub concurrency: usize,
    pub send_timeout_secs: u64,
    pub device_failures: FailurePolicy,
    pub user_failures: FailurePolicy,
    /// Published to devices instead of the alert text when set.
    pub device_command: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            send_timeout_secs: 3,
            device_failures: FailurePolicy::LogOnly,
            user_failures: FailurePolicy::Surface,
            device_command: None,
        }
    }
}

/// MQTT broker carrying device alerts.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// A random id is generated when unset.
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_topic_prefix() -> String {
    "device".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatBotConfig {
    #[serde(default = "default_bot_api_base")]
    pub api_base: String,
    pub token: String,
}

fn default_bot_api_base() -> String {
    DEFAULT_BOT_API_BASE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingAppConfig {
    /// Gateway endpoint accepting `{ "target", "message" }` JSON bodies.
    pub endpoint: String,
    pub token: String,
}

/// Self-registration of devices and chat-bot users.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Accept `"lat,lon"` registrations published on the device bus.
    pub devices: bool,
    pub device_topic: String,
    /// The assigned device id is published here.
    pub device_ack_topic: String,
    /// Long-poll the chat bot for shared locations. Ignored without `[chat_bot]`.
    pub chat_bot: bool,
    pub poll_timeout_secs: u64,
    pub retry_delay_secs: u64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            devices: true,
            device_topic: "device/register/iot".to_string(),
            device_ack_topic: "device/berhasil".to_string(),
            chat_bot: true,
            poll_timeout_secs: 30,
            retry_delay_secs: 5,
        }
    }
}
