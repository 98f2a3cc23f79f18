//! DeviceRegistrar processor.
//!
//! Alarm devices register themselves by publishing `"lat,lon"` on the
//! registration topic. The registrar stores each one in the directory and
//! publishes the assigned id back so the device knows which topic to
//! listen on. A bad payload is logged and dropped.

use crate::collaborators::{DirectoryError, RecipientRegistry};
use crate::dispatch::{DispatchError, RegistrationAck};
use crate::geo::{Coordinate, parse_coordinate_component};
use quakewatch_sdk::client::ClientError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Errors from the device and chat-bot registration flows.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid registration payload {0:?}")]
    Payload(String),

    #[error("failed to store registration: {0}")]
    Directory(#[from] DirectoryError),

    #[error("failed to acknowledge device {device_id}: {source}")]
    Ack {
        device_id: String,
        source: DispatchError,
    },

    #[error("failed to poll chat-bot updates: {0}")]
    Poll(#[from] ClientError),

    #[error("chat-bot poll did not settle within {0:?}")]
    PollTimeout(Duration),
}

/// Parse a `"lat,lon"` registration payload.
pub fn parse_device_payload(payload: &[u8]) -> Result<Coordinate, RegistrationError> {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim();
    text.split_once(',')
        .and_then(|(lat, lon)| {
            parse_coordinate_component(lat).zip(parse_coordinate_component(lon))
        })
        .and_then(|(lat, lon)| Coordinate::new(lat, lon))
        .ok_or_else(|| RegistrationError::Payload(text.to_string()))
}

/// Stores self-registered devices and acknowledges them.
#[derive(Clone)]
pub struct DeviceRegistrar {
    registry: Arc<dyn RecipientRegistry>,
    ack: Arc<dyn RegistrationAck>,
}

impl DeviceRegistrar {
    pub fn new(registry: Arc<dyn RecipientRegistry>, ack: Arc<dyn RegistrationAck>) -> Self {
        Self { registry, ack }
    }

    /// Register one device and return its id.
    ///
    /// The row is kept even when the acknowledgement fails.
    pub async fn register(&self, payload: &[u8]) -> Result<String, RegistrationError> {
        let location = parse_device_payload(payload)?;
        let device_id = self.registry.register_device(location).await?;
        info!(device_id = %device_id, %location, "Device registered");

        self.ack
            .acknowledge(&device_id)
            .await
            .map_err(|source| RegistrationError::Ack {
                device_id: device_id.clone(),
                source,
            })?;
        Ok(device_id)
    }

    /// Handle payloads from `requests` until shutdown or until the sender
    /// side closes.
    pub fn start(
        self,
        mut requests: mpsc::Receiver<Vec<u8>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("DeviceRegistrar started");
            loop {
                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("DeviceRegistrar received shutdown signal");
                            break;
                        }
                    }

                    request = requests.recv() => {
                        let Some(payload) = request else {
                            break;
                        };
                        if let Err(e) = self.register(&payload).await {
                            warn!(error = %e, "Device registration failed");
                        }
                    }
                }
            }
            info!("DeviceRegistrar shutdown complete");
        })
    }
}
