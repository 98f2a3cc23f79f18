//! Signal handling for graceful shutdown and config reload.

use crate::config::ConfigLoader;
use quakewatch_core::config::{ConfigStore, IngestionSettings, NotifierSettings};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

/// Wait for one occurrence of `kind`. Never completes if the handler
/// cannot be installed.
async fn wait_for(kind: SignalKind, name: &'static str) {
    match signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
            tracing::info!("Received {}, initiating graceful shutdown", name);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install {} handler", name);
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    tokio::select! {
        _ = wait_for(SignalKind::terminate(), "SIGTERM") => {}
        _ = wait_for(SignalKind::interrupt(), "SIGINT") => {}
    }
}

/// Spawns a task that listens for SIGHUP and reloads the configuration.
///
/// Polling and fan-out settings are swapped in place; the worker and the
/// notifier pick them up on their next cycle. Returns a Notify that stops
/// the task.
pub fn spawn_config_reload_handler(
    config_loader: Arc<ConfigLoader>,
    ingestion_store: ConfigStore<IngestionSettings>,
    notifier_store: ConfigStore<NotifierSettings>,
) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();

    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler, config reload disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match config_loader.reload() {
                        Ok(config) => {
                            ingestion_store.update(config.ingestion);
                            notifier_store.update(config.notifier);
                            tracing::info!(
                                "Configuration reloaded; feed, broker and channel changes apply after restart"
                            );
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Config reload handler shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}
