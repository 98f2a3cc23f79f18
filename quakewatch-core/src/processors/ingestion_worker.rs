//! IngestionWorker processor.
//!
//! The IngestionWorker is responsible for:
//! - Polling the upstream feed on a fixed interval, starting immediately
//! - Persisting each fetched event (best-effort)
//! - Handing the event to the [`ImpactNotifier`]
//! - Stopping cooperatively when [`IngestionWorker::stop`] is called
//!
//! Cycles never overlap. Cancellation is observed at the top of every tick
//! and again once the fetch has completed; a fan-out already in progress
//! always runs to completion.

use crate::collaborators::{EarthquakeFeed, EventStore, FeedError};
use crate::config::{ConfigStore, IngestionSettings};
use crate::processors::impact_notifier::{FanoutSummary, ImpactNotifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Observable worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Fetching,
    Processing,
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Fetching => write!(f, "fetching"),
            WorkerState::Processing => write!(f, "processing"),
            WorkerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The feed could not be fetched or parsed; nothing else happened.
    FetchFailed,
    /// A stop request arrived while fetching; the event was discarded.
    Cancelled,
    /// The feed still reports the last processed event.
    Unchanged { identity: String },
    /// The event was handed to the notifier.
    Processed {
        identity: String,
        stored: bool,
        summary: FanoutSummary,
        /// Number of errors the notifier surfaced.
        errors: usize,
    },
}

struct Shared {
    feed: Arc<dyn EarthquakeFeed>,
    store: Arc<dyn EventStore>,
    notifier: ImpactNotifier,
    settings: ConfigStore<IngestionSettings>,
    shutdown_tx: watch::Sender<bool>,
    state_tx: watch::Sender<WorkerState>,
    last_identity: Mutex<Option<String>>,
}

/// Periodically ingests the latest earthquake report.
///
/// Cloning yields another handle to the same worker.
#[derive(Clone)]
pub struct IngestionWorker {
    shared: Arc<Shared>,
}

impl IngestionWorker {
    pub fn new(
        feed: Arc<dyn EarthquakeFeed>,
        store: Arc<dyn EventStore>,
        notifier: ImpactNotifier,
        settings: ConfigStore<IngestionSettings>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (state_tx, _) = watch::channel(WorkerState::Idle);
        Self {
            shared: Arc::new(Shared {
                feed,
                store,
                notifier,
                settings,
                shutdown_tx,
                state_tx,
                last_identity: Mutex::new(None),
            }),
        }
    }

    /// Spawn the scheduling loop and return immediately.
    ///
    /// Each call spawns an independent loop; callers must not start the same
    /// worker twice.
    pub fn start(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let shutdown_rx = shared.shutdown_tx.subscribe();
        tokio::spawn(shared.run(shutdown_rx))
    }

    /// Request cooperative cancellation.
    ///
    /// Takes effect at the loop's next checkpoint. Await the handle returned
    /// by [`start`](Self::start) to wait for the loop to finish.
    pub fn stop(&self) {
        info!("IngestionWorker stop requested");
        self.shared.shutdown_tx.send_replace(true);
    }

    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.shared.state_tx.subscribe()
    }

    /// Run one fetch, store and notify cycle right now.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.shared.run_cycle().await
    }
}

/// Zero periods are clamped; `interval_at` rejects them.
fn ticker(period: Duration, start: Instant) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl Shared {
    fn stopping(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    fn set_state(&self, state: WorkerState) {
        self.state_tx.send_replace(state);
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut settings_watcher = self.settings.subscribe();
        let mut period = self.settings.current().interval;
        info!(interval = ?period, "IngestionWorker started");

        if self.settings.current().skip_unchanged {
            self.seed_last_identity().await;
        }

        let mut interval = ticker(period, Instant::now());

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("IngestionWorker received shutdown signal");
                        break;
                    }
                }

                Ok(settings) = settings_watcher.changed() => {
                    if settings.interval != period {
                        period = settings.interval;
                        interval = ticker(period, Instant::now() + period);
                        info!(interval = ?period, "IngestionWorker interval changed");
                    }
                }

                _ = interval.tick() => {
                    if self.stopping() {
                        break;
                    }
                    let outcome = self.run_cycle().await;
                    debug!(outcome = ?outcome, "Ingestion cycle finished");
                }
            }
        }

        self.set_state(WorkerState::Stopped);
        info!("IngestionWorker shutdown complete");
    }

    async fn seed_last_identity(&self) {
        match self.store.latest_identity().await {
            Ok(Some(identity)) => {
                debug!(identity = %identity, "Seeded last processed event from store");
                *self.last_identity.lock().await = Some(identity);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Failed to read last stored event, first report will be processed");
            }
        }
    }

    async fn run_cycle(&self) -> CycleOutcome {
        let settings = self.settings.current();

        self.set_state(WorkerState::Fetching);
        let fetched = match tokio::time::timeout(settings.fetch_timeout, self.feed.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(settings.fetch_timeout)),
        };

        let event = match fetched {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Failed to fetch earthquake report, skipping cycle");
                self.set_state(WorkerState::Idle);
                return CycleOutcome::FetchFailed;
            }
        };

        if self.stopping() {
            self.set_state(WorkerState::Idle);
            return CycleOutcome::Cancelled;
        }

        let identity = event.identity().to_string();
        {
            let mut last = self.last_identity.lock().await;
            if settings.skip_unchanged && last.as_deref() == Some(identity.as_str()) {
                debug!(identity = %identity, "Report unchanged since last cycle");
                self.set_state(WorkerState::Idle);
                return CycleOutcome::Unchanged { identity };
            }
            *last = Some(identity.clone());
        }

        self.set_state(WorkerState::Processing);
        info!(
            identity = %identity,
            magnitude = event.magnitude,
            epicenter = %event.epicenter,
            region = %event.region,
            "Processing earthquake report"
        );

        let stored = match self.store.save_event(&event).await {
            Ok(()) => true,
            Err(e) => {
                error!(identity = %identity, error = %e, "Failed to store earthquake report");
                false
            }
        };

        let (summary, errors) = match self.notifier.notify(&event).await {
            Ok(summary) => (summary, 0),
            Err(failure) => {
                for e in &failure.errors {
                    error!(identity = %identity, error = %e, "Impact notification error");
                }
                (failure.summary, failure.errors.len())
            }
        };

        self.set_state(WorkerState::Idle);
        CycleOutcome::Processed {
            identity,
            stored,
            summary,
            errors,
        }
    }
}
