//! Processors driving the alerting pipeline.
//!
//! - `IngestionWorker`: polls the feed on an interval, stores each report
//!   and hands it to the notifier
//! - `ImpactNotifier`: evaluates every recipient for one event and
//!   dispatches alerts to those within the felt radius
//! - `DeviceRegistrar`: stores devices that announce themselves on the
//!   device bus
//! - `ChatBotRegistrar`: subscribes chat-bot users who share a location

pub mod chat_registrar;
pub mod device_registrar;
pub mod impact_notifier;
pub mod ingestion_worker;

pub use chat_registrar::{ChatAction, ChatBotRegistrar};
pub use device_registrar::{DeviceRegistrar, RegistrationError, parse_device_payload};
pub use impact_notifier::{AlertMessage, FanoutSummary, ImpactNotifier, NotifyError, NotifyFailure};
pub use ingestion_worker::{CycleOutcome, IngestionWorker, WorkerState};
