//! ImpactNotifier processor.
//!
//! The ImpactNotifier is responsible for:
//! - Rendering one alert text per event
//! - Enumerating devices and users from the directory (concurrently)
//! - Evaluating every recipient against the felt-radius model
//! - Dispatching to felt recipients over their channel with bounded
//!   concurrency and a per-send timeout
//! - Applying the configured [`FailurePolicy`] to each recipient class
//!
//! A malformed recipient or a failed send never stops the rest of the batch.

use crate::collaborators::{DirectoryError, RecipientDirectory};
use crate::config::{ConfigStore, FailurePolicy, NotifierSettings};
use crate::dispatch::{ChannelDispatcher, DispatchError};
use crate::entities::{ChannelKind, EarthquakeEvent, ParseError, Recipient, RecipientKind, Route};
use crate::geo;
use futures_util::{StreamExt, stream};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Human-readable alert text.
pub struct AlertMessage;

impl AlertMessage {
    pub fn render(event: &EarthquakeEvent) -> String {
        let raw = &event.raw;
        let magnitude = if raw.magnitude.trim().is_empty() {
            event.magnitude.to_string()
        } else {
            raw.magnitude.trim().to_string()
        };
        let location = if raw.lintang.is_empty() || raw.bujur.is_empty() {
            event.epicenter.to_string()
        } else {
            format!("{}, {}", raw.lintang, raw.bujur)
        };
        let depth = if raw.kedalaman.is_empty() {
            "unknown".to_string()
        } else {
            raw.kedalaman.clone()
        };
        let time = if raw.tanggal.is_empty() && raw.jam.is_empty() {
            event.occurred_at.to_string()
        } else {
            format!("{} {}", raw.tanggal, raw.jam).trim().to_string()
        };

        format!(
            "Earthquake Alert! Magnitude: {}\nLocation: {}\nDepth: {}\nTime: {}\nRegion: {}",
            magnitude, location, depth, time, event.region
        )
    }
}

/// Counters for one fan-out.
///
/// `skipped_malformed` recipients are counted neither as felt nor as not felt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutSummary {
    pub evaluated: usize,
    pub felt: usize,
    pub not_felt: usize,
    pub skipped_malformed: usize,
    pub skipped_duplicate: usize,
    pub skipped_no_channel: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// A failure surfaced to the caller of [`ImpactNotifier::notify`].
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A recipient class could not be enumerated at all.
    #[error("failed to list {kind}s: {source}")]
    Directory {
        kind: RecipientKind,
        source: DirectoryError,
    },

    /// A send failed for a class whose policy is [`FailurePolicy::Surface`].
    #[error("failed to notify {kind} {recipient} via {channel}: {source}")]
    Dispatch {
        kind: RecipientKind,
        recipient: String,
        channel: ChannelKind,
        source: DispatchError,
    },
}

/// Returned when a fan-out finished with surfaced errors.
///
/// Sends that succeeded are not rolled back; `summary` still describes the
/// whole run.
#[derive(Debug, Error)]
#[error("impact notification finished with {} error(s)", .errors.len())]
pub struct NotifyFailure {
    pub summary: FanoutSummary,
    pub errors: Vec<NotifyError>,
}

/// One planned send.
#[derive(Debug, Clone)]
struct Delivery {
    kind: RecipientKind,
    recipient: String,
    route: Route,
}

/// Evaluates recipients for one event and sends alerts to those who feel it.
#[derive(Clone)]
pub struct ImpactNotifier {
    directory: Arc<dyn RecipientDirectory>,
    dispatcher: ChannelDispatcher,
    settings: ConfigStore<NotifierSettings>,
}

impl ImpactNotifier {
    pub fn new(
        directory: Arc<dyn RecipientDirectory>,
        dispatcher: ChannelDispatcher,
        settings: ConfigStore<NotifierSettings>,
    ) -> Self {
        Self {
            directory,
            dispatcher,
            settings,
        }
    }

    /// Notify every recipient that would feel `event`.
    ///
    /// Returns `Err` only for directory failures and for send failures of a
    /// class configured with [`FailurePolicy::Surface`]. All sends have
    /// settled when this returns.
    pub async fn notify(&self, event: &EarthquakeEvent) -> Result<FanoutSummary, NotifyFailure> {
        let settings = self.settings.current();
        let message = AlertMessage::render(event);
        let device_message = settings
            .device_command
            .clone()
            .unwrap_or_else(|| message.clone());

        let (devices, users) =
            tokio::join!(self.directory.list_devices(), self.directory.list_users());

        let mut summary = FanoutSummary::default();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        let device_jobs = match devices {
            Ok(records) => plan(
                event,
                records.iter().map(Recipient::try_from),
                &mut seen,
                &mut summary,
            ),
            Err(source) => {
                error!(error = %source, "Failed to list devices");
                errors.push(NotifyError::Directory {
                    kind: RecipientKind::Device,
                    source,
                });
                Vec::new()
            }
        };

        let user_jobs = match users {
            Ok(records) => plan(
                event,
                records.iter().map(Recipient::try_from),
                &mut seen,
                &mut summary,
            ),
            Err(source) => {
                error!(error = %source, "Failed to list users");
                errors.push(NotifyError::Directory {
                    kind: RecipientKind::User,
                    source,
                });
                Vec::new()
            }
        };

        let (device_results, user_results) = tokio::join!(
            self.deliver(device_jobs, &device_message, &settings),
            self.deliver(user_jobs, &message, &settings),
        );

        for (results, policy) in [
            (device_results, settings.device_failures),
            (user_results, settings.user_failures),
        ] {
            for (job, result) in results {
                match result {
                    Ok(()) => {
                        summary.delivered += 1;
                        debug!(
                            kind = %job.kind,
                            recipient = %job.recipient,
                            channel = %job.route.channel,
                            "Alert delivered"
                        );
                    }
                    Err(source) => {
                        summary.failed += 1;
                        warn!(
                            kind = %job.kind,
                            recipient = %job.recipient,
                            channel = %job.route.channel,
                            error = %source,
                            "Alert delivery failed"
                        );
                        if policy == FailurePolicy::Surface {
                            errors.push(NotifyError::Dispatch {
                                kind: job.kind,
                                recipient: job.recipient,
                                channel: job.route.channel,
                                source,
                            });
                        }
                    }
                }
            }
        }

        info!(
            identity = %event.identity(),
            magnitude = event.magnitude,
            evaluated = summary.evaluated,
            felt = summary.felt,
            delivered = summary.delivered,
            failed = summary.failed,
            skipped_malformed = summary.skipped_malformed,
            "Impact notification finished"
        );

        if errors.is_empty() {
            Ok(summary)
        } else {
            Err(NotifyFailure { summary, errors })
        }
    }

    /// Run `jobs` with at most `settings.concurrency` sends in flight and
    /// wait for all of them.
    async fn deliver(
        &self,
        jobs: Vec<Delivery>,
        message: &str,
        settings: &NotifierSettings,
    ) -> Vec<(Delivery, Result<(), DispatchError>)> {
        let dispatcher = &self.dispatcher;
        let send_timeout = settings.send_timeout;

        stream::iter(jobs)
            .map(|job| async move {
                let send = dispatcher.send(job.route.channel, &job.route.address, message);
                let result = match tokio::time::timeout(send_timeout, send).await {
                    Ok(result) => result,
                    Err(_) => Err(DispatchError::Timeout(send_timeout)),
                };
                (job, result)
            })
            .buffer_unordered(settings.concurrency.max(1))
            .collect()
            .await
    }
}

/// Evaluate recipients in enumeration order and collect the sends to make.
fn plan(
    event: &EarthquakeEvent,
    recipients: impl Iterator<Item = Result<Recipient, ParseError>>,
    seen: &mut HashSet<Route>,
    summary: &mut FanoutSummary,
) -> Vec<Delivery> {
    let mut jobs = Vec::new();

    for parsed in recipients {
        let recipient = match parsed {
            Ok(recipient) => recipient,
            Err(e) => {
                summary.skipped_malformed += 1;
                debug!(error = %e, "Skipping recipient");
                continue;
            }
        };

        summary.evaluated += 1;
        let assessment = geo::evaluate(event.epicenter, recipient.location(), event.magnitude);
        if !assessment.felt {
            summary.not_felt += 1;
            continue;
        }
        summary.felt += 1;

        let Some(route) = recipient.route() else {
            summary.skipped_no_channel += 1;
            debug!(recipient = %recipient.id(), "Felt but no usable channel preference");
            continue;
        };

        if !seen.insert(route.clone()) {
            summary.skipped_duplicate += 1;
            continue;
        }

        debug!(
            kind = %recipient.kind(),
            recipient = %recipient.id(),
            distance_km = assessment.distance_km,
            intensity = assessment.intensity,
            "Recipient within felt radius"
        );

        jobs.push(Delivery {
            kind: recipient.kind(),
            recipient: recipient.id().to_string(),
            route,
        });
    }

    jobs
}
