//! Configuration module for quakewatch-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{ChatBotSettings, MessagingAppSettings, RuntimeConfig};
use quakewatch_core::config::{ChatRegistrationSettings, IngestionSettings, NotifierSettings};
use quakewatch_core::dispatch::{MqttSettings, RegistrationTopics};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid URL for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, validate and convert the configuration file.
    pub fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.parse(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<RuntimeConfig, ConfigError> {
        self.load()
    }

    fn parse(&self, content: &str) -> Result<RuntimeConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        build_runtime_config(file_config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.feed.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "feed.interval_secs must be positive".to_string(),
        ));
    }
    if config.feed.fetch_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "feed.fetch_timeout_secs must be positive".to_string(),
        ));
    }
    if config.notifier.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "notifier.concurrency must be at least 1".to_string(),
        ));
    }
    if config.notifier.send_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "notifier.send_timeout_secs must be positive".to_string(),
        ));
    }
    if config.mqtt.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "mqtt.host must not be empty".to_string(),
        ));
    }
    if config
        .notifier
        .device_command
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(
            "notifier.device_command must not be blank".to_string(),
        ));
    }
    let registration = &config.registration;
    if registration.devices {
        for (field, topic) in [
            ("registration.device_topic", &registration.device_topic),
            ("registration.device_ack_topic", &registration.device_ack_topic),
        ] {
            if topic.trim().is_empty() || topic.contains(['+', '#']) {
                return Err(ConfigError::ValidationError(format!(
                    "{field} must be a non-empty topic without wildcards"
                )));
            }
        }
        if registration.device_topic == registration.device_ack_topic {
            return Err(ConfigError::ValidationError(
                "registration.device_topic and registration.device_ack_topic must differ"
                    .to_string(),
            ));
        }
    }
    if registration.chat_bot && registration.poll_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "registration.poll_timeout_secs must be positive".to_string(),
        ));
    }
    Ok(())
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn build_runtime_config(file_config: FileConfig) -> Result<RuntimeConfig, ConfigError> {
    let chat_bot = file_config
        .chat_bot
        .map(|c| {
            Ok::<_, ConfigError>(ChatBotSettings {
                api_base: parse_url("chat_bot.api_base", &c.api_base)?,
                token: c.token,
            })
        })
        .transpose()?;

    let messaging_app = file_config
        .messaging_app
        .map(|m| {
            Ok::<_, ConfigError>(MessagingAppSettings {
                endpoint: parse_url("messaging_app.endpoint", &m.endpoint)?,
                token: m.token,
            })
        })
        .transpose()?;

    let mqtt = file_config.mqtt;
    let notifier = file_config.notifier;
    let feed = file_config.feed;
    let registration = file_config.registration;

    let chat_registration =
        (registration.chat_bot && chat_bot.is_some()).then(|| ChatRegistrationSettings {
            poll_timeout: Duration::from_secs(registration.poll_timeout_secs),
            retry_delay: Duration::from_secs(registration.retry_delay_secs),
        });

    Ok(RuntimeConfig {
        listen: file_config.server.listen,
        feed_url: parse_url("feed.url", &feed.url)?,
        ingestion: IngestionSettings {
            interval: Duration::from_secs(feed.interval_secs),
            fetch_timeout: Duration::from_secs(feed.fetch_timeout_secs),
            skip_unchanged: feed.skip_unchanged,
        },
        notifier: NotifierSettings {
            concurrency: notifier.concurrency,
            send_timeout: Duration::from_secs(notifier.send_timeout_secs),
            device_failures: notifier.device_failures,
            user_failures: notifier.user_failures,
            device_command: notifier.device_command,
        },
        mqtt: MqttSettings {
            host: mqtt.host,
            port: mqtt.port,
            client_id: mqtt
                .client_id
                .unwrap_or_else(|| format!("quakewatch-{}", Uuid::new_v4())),
            username: mqtt.username,
            password: mqtt.password,
            topic_prefix: mqtt.topic_prefix,
            keep_alive: Duration::from_secs(mqtt.keep_alive_secs),
            registration: registration.devices.then(|| RegistrationTopics {
                request: registration.device_topic,
                ack: registration.device_ack_topic,
            }),
        },
        chat_bot,
        messaging_app,
        chat_registration,
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quakewatch_core::config::FailurePolicy;

    fn loader() -> ConfigLoader {
        ConfigLoader::new("unused.toml", None)
    }

    #[test]
    fn test_parse_builds_runtime_settings() {
        let config = loader()
            .parse(
                r#"
[feed]
interval_secs = 2
fetch_timeout_secs = 4

[notifier]
send_timeout_secs = 1
device_failures = "surface"

[mqtt]
host = "localhost"
client_id = "quakewatch-test"

[chat_bot]
token = "123:abc"
"#,
            )
            .unwrap();

        assert_eq!(config.ingestion.interval, Duration::from_secs(2));
        assert_eq!(config.ingestion.fetch_timeout, Duration::from_secs(4));
        assert_eq!(config.notifier.send_timeout, Duration::from_secs(1));
        assert_eq!(config.notifier.device_failures, FailurePolicy::Surface);
        assert_eq!(config.mqtt.client_id, "quakewatch-test");
        assert_eq!(config.mqtt.keep_alive, Duration::from_secs(30));
        assert_eq!(
            config.chat_bot.unwrap().api_base.as_str(),
            "https://api.telegram.org/"
        );
        assert!(config.messaging_app.is_none());
        assert_eq!(config.feed_url.host_str(), Some("data.bmkg.go.id"));
    }

    #[test]
    fn test_registration_settings() {
        let config = loader()
            .parse("[mqtt]\nhost = \"localhost\"\n[chat_bot]\ntoken = \"t\"\n[registration]\npoll_timeout_secs = 20\n")
            .unwrap();
        assert_eq!(
            config.mqtt.registration,
            Some(RegistrationTopics {
                request: "device/register/iot".to_string(),
                ack: "device/berhasil".to_string(),
            })
        );
        assert_eq!(
            config.chat_registration,
            Some(ChatRegistrationSettings {
                poll_timeout: Duration::from_secs(20),
                retry_delay: Duration::from_secs(5),
            })
        );

        let without_bot = loader().parse("[mqtt]\nhost = \"localhost\"\n").unwrap();
        assert!(without_bot.chat_registration.is_none());

        let disabled = loader()
            .parse("[mqtt]\nhost = \"localhost\"\n[chat_bot]\ntoken = \"t\"\n[registration]\ndevices = false\nchat_bot = false\n")
            .unwrap();
        assert!(disabled.mqtt.registration.is_none());
        assert!(disabled.chat_registration.is_none());
    }

    #[test]
    fn test_generated_client_id() {
        let config = loader().parse("[mqtt]\nhost = \"localhost\"\n").unwrap();
        assert!(config.mqtt.client_id.starts_with("quakewatch-"));
    }

    #[test]
    fn test_listen_override() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ConfigLoader::new("unused.toml", Some(addr))
            .parse("[mqtt]\nhost = \"localhost\"\n")
            .unwrap();
        assert_eq!(config.listen, addr);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "[feed]\ninterval_secs = 0\n[mqtt]\nhost = \"localhost\"\n",
            "[notifier]\nconcurrency = 0\n[mqtt]\nhost = \"localhost\"\n",
            "[notifier]\nsend_timeout_secs = 0\n[mqtt]\nhost = \"localhost\"\n",
            "[notifier]\ndevice_command = \" \"\n[mqtt]\nhost = \"localhost\"\n",
            "[mqtt]\nhost = \"\"\n",
            "[mqtt]\nhost = \"localhost\"\n[registration]\ndevice_topic = \"device/+/register\"\n",
            "[mqtt]\nhost = \"localhost\"\n[registration]\ndevice_ack_topic = \"device/register/iot\"\n",
            "[mqtt]\nhost = \"localhost\"\n[registration]\npoll_timeout_secs = 0\n",
        ];
        for case in cases {
            assert!(
                matches!(loader().parse(case), Err(ConfigError::ValidationError(_))),
                "accepted {case:?}"
            );
        }
    }

    #[test]
    fn test_invalid_url_is_reported_with_field() {
        let err = loader()
            .parse("[mqtt]\nhost = \"localhost\"\n[messaging_app]\nendpoint = \"not a url\"\ntoken = \"t\"\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl { field: "messaging_app.endpoint", .. }
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new("/nonexistent/quakewatch.toml", None)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
