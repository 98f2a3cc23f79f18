pub mod earthquake;
pub mod recipient;

pub use earthquake::{EarthquakeEvent, GetLatestEarthquakeIdentity, InsertEarthquakeRecord};
pub use recipient::{
    ChannelKind, DeviceRecord, InsertDeviceRecord, ListDeviceRecords, ListUserRecords, Recipient,
    RecipientKind, Route, UpsertChatBotUser, UserChannel, UserRecord,
};

use thiserror::Error;

/// A single record that could not be normalised.
///
/// Parse failures are isolated to the offending record and never abort a
/// whole cycle or batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid magnitude {0:?}")]
    Magnitude(String),

    #[error(
        "invalid epicenter (coordinates {coordinates:?}, latitude {latitude:?}, longitude {longitude:?})"
    )]
    Epicenter {
        coordinates: String,
        latitude: String,
        longitude: String,
    },

    #[error("invalid location for {kind} {id} (latitude {latitude:?}, longitude {longitude:?})")]
    RecipientLocation {
        kind: RecipientKind,
        id: String,
        latitude: String,
        longitude: String,
    },
}
