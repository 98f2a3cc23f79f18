//! Runtime settings shared by the processors.
//!
//! Loading and validation of the configuration file lives in the server
//! crate; these are the validated values it hands over.

mod config_store;
mod settings;

pub use config_store::{ConfigStore, ConfigWatcher};
pub use settings::{
    ChatRegistrationSettings, FailurePolicy, IngestionSettings, NotifierSettings,
};
