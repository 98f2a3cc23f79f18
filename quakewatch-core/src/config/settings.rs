//! Runtime settings for the ingestion worker and the notifier.

use serde::Deserialize;
use std::time::Duration;

/// What happens to a failed send for a class of recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and carry on; the caller never sees it.
    LogOnly,
    /// Log the failure and include it in the error returned to the caller.
    Surface,
}

/// Settings read by [`ImpactNotifier`](crate::processors::ImpactNotifier)
/// at the start of every fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierSettings {
    /// Upper bound on sends in flight per recipient class.
    pub concurrency: usize,
    /// Bound on a single outbound send.
    pub send_timeout: Duration,
    pub device_failures: FailurePolicy,
    pub user_failures: FailurePolicy,
    /// Short command published to devices instead of the full alert text.
    pub device_command: Option<String>,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            send_timeout: Duration::from_secs(3),
            device_failures: FailurePolicy::LogOnly,
            user_failures: FailurePolicy::Surface,
            device_command: None,
        }
    }
}

/// Settings read by [`IngestionWorker`](crate::processors::IngestionWorker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionSettings {
    pub interval: Duration,
    /// Bound on a single upstream fetch.
    pub fetch_timeout: Duration,
    /// Skip storage and notification when the feed still reports the
    /// previously processed event.
    pub skip_unchanged: bool,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(5),
            skip_unchanged: true,
        }
    }
}

/// Settings for [`ChatBotRegistrar`](crate::processors::ChatBotRegistrar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRegistrationSettings {
    /// How long the bot API may hold one long-poll open.
    pub poll_timeout: Duration,
    /// Pause after a failed poll.
    pub retry_delay: Duration,
}

impl Default for ChatRegistrationSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(5),
        }
    }
}
