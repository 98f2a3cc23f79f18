//! Messaging-app gateway client.

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::GatewayMessage;

/// Typed HTTP client for a messaging-app delivery gateway.
///
/// The gateway accepts `{"target", "message"}` JSON and authenticates with
/// a static token in the `Authorization` header.
#[derive(Debug, Clone)]
pub struct MessagingClient {
    http: Client,
    endpoint: Url,
    token: String,
}

impl MessagingClient {
    pub fn new(endpoint: Url, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint,
            token: token.into(),
        }
    }

    /// Deliver `text` to `target`.
    pub async fn send(&self, target: &str, text: &str) -> Result<(), ClientError> {
        let body = GatewayMessage {
            target: target.to_string(),
            message: text.to_string(),
        };

        let resp = self
            .http
            .post(self.endpoint.clone())
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }
}
