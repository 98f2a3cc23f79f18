//! HTTP clients for the upstream feed and the outbound chat channels.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.
//!
//! The clients carry no request timeout of their own; callers bound each
//! call so that a reloaded timeout takes effect on the next request.

mod chat_bot;
mod feed;
mod messaging;

pub use chat_bot::{ChatBotClient, DEFAULT_BOT_API_BASE};
pub use feed::{DEFAULT_FEED_URL, FeedClient};
pub use messaging::MessagingClient;

use reqwest::StatusCode;

/// Errors produced by the SDK HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The remote accepted the request but refused to act on it.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Decode a JSON response, mapping non-2xx statuses to [`ClientError::Api`].
///
/// Body read failures drop the request URL, which may carry a token.
async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ClientError::Http(e.without_url()))?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
