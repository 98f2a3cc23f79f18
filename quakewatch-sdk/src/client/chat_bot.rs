//! Chat-bot API client.

use reqwest::Client;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::{BotApiEnvelope, GetUpdatesRequest, SendMessageRequest, Update};

/// Default bot API root.
pub const DEFAULT_BOT_API_BASE: &str = "https://api.telegram.org";

/// Typed HTTP client for the bot API methods quakewatch uses.
#[derive(Debug, Clone)]
pub struct ChatBotClient {
    http: Client,
    api_base: Url,
    token: String,
}

impl ChatBotClient {
    /// Create a new `ChatBotClient`.
    ///
    /// * `api_base` – root of the bot API (e.g. `https://api.telegram.org`).
    ///   A path prefix such as `https://relay.local/telegram` is kept.
    /// * `token` – the bot token issued by the platform.
    pub fn new(mut api_base: Url, token: impl Into<String>) -> Self {
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }
        Self {
            http: Client::new(),
            api_base,
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> Result<Url, ClientError> {
        Ok(self
            .api_base
            .join(&format!("bot{}/{}", self.token, method))?)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<Option<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.method_url(method)?;

        // Errors would otherwise echo the token-bearing URL.
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.without_url()))?;
        let envelope: BotApiEnvelope<T> = parse_response(resp).await?;
        if !envelope.ok {
            return Err(ClientError::Rejected(
                envelope
                    .description
                    .unwrap_or_else(|| format!("bot api {method} returned ok=false")),
            ));
        }
        Ok(envelope.result)
    }

    /// `POST /bot{token}/sendMessage`.
    pub async fn send(&self, request: &SendMessageRequest) -> Result<(), ClientError> {
        self.call::<_, IgnoredAny>("sendMessage", request).await?;
        Ok(())
    }

    /// Send plain `text` to `chat_id`.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ClientError> {
        self.send(&SendMessageRequest {
            chat_id,
            text: text.to_string(),
            reply_markup: None,
        })
        .await
    }

    /// `POST /bot{token}/getUpdates`, long-polling for up to `timeout_secs`.
    ///
    /// Only `message` updates are requested. Pass the last seen
    /// `update_id + 1` as `offset` to acknowledge earlier updates.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ClientError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message".to_string()],
        };
        Ok(self
            .call::<_, Vec<Update>>("getUpdates", &request)
            .await?
            .unwrap_or_default())
    }
}
