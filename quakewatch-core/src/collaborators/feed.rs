use crate::entities::{EarthquakeEvent, ParseError};
use async_trait::async_trait;
use quakewatch_sdk::client::{ClientError, FeedClient};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

/// Errors that can occur while fetching the latest report.
///
/// None of these are fatal: the ingestion worker logs them and waits for
/// the next tick.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Upstream unreachable, non-2xx, or undecodable body.
    #[error("feed request failed: {0}")]
    Client(#[from] ClientError),

    /// The request did not settle within the configured bound.
    #[error("feed request timed out after {0:?}")]
    Timeout(Duration),

    /// The document decoded but its values are unusable.
    #[error("malformed report: {0}")]
    Parse(#[from] ParseError),
}

/// Source of the most recent earthquake report.
#[async_trait]
pub trait EarthquakeFeed: Send + Sync {
    /// Fetch and normalise the latest report.
    async fn fetch(&self) -> Result<EarthquakeEvent, FeedError>;
}

/// Feed backed by the public latest-earthquake JSON endpoint.
pub struct BmkgFeed {
    client: FeedClient,
}

impl BmkgFeed {
    pub fn new(client: FeedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EarthquakeFeed for BmkgFeed {
    async fn fetch(&self) -> Result<EarthquakeEvent, FeedError> {
        debug!(url = %self.client.url(), "Fetching latest earthquake report");
        let response = self.client.fetch_latest().await?;
        let event = EarthquakeEvent::from_report(response.infogempa.gempa, OffsetDateTime::now_utc())?;
        Ok(event)
    }
}
