//! Client for the upstream latest-earthquake feed.

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::AutoGempaResponse;

/// Default public endpoint publishing the most recent felt earthquake.
pub const DEFAULT_FEED_URL: &str = "https://data.bmkg.go.id/DataMKG/TEWS/autogempa.json";

/// Typed HTTP client for the latest-earthquake document.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
    url: Url,
}

impl FeedClient {
    pub fn new(url: Url) -> Self {
        Self {
            http: Client::new(),
            url,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `GET` the feed once and decode it.
    pub async fn fetch_latest(&self) -> Result<AutoGempaResponse, ClientError> {
        let resp = self.http.get(self.url.clone()).send().await?;
        parse_response(resp).await
    }
}
