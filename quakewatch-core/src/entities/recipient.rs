use crate::entities::ParseError;
use crate::framework::DatabaseProcessor;
use crate::geo::{Coordinate, parse_coordinate_component};
use kanau::processor::Processor;

/// A registered alarm device as stored in the directory.
///
/// Coordinates are kept as text; see [`Recipient::try_from`].
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DeviceRecord {
    pub id: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// A human subscriber as stored in the directory.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    /// Chat id or phone number, depending on `channel`.
    pub identifier: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    /// Stored channel preference, e.g. `"telegram"` or `"wa"`.
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientKind {
    Device,
    User,
}

impl std::fmt::Display for RecipientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientKind::Device => write!(f, "device"),
            RecipientKind::User => write!(f, "user"),
        }
    }
}

/// Outbound channel families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    DeviceBus,
    ChatBot,
    MessagingApp,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::DeviceBus => write!(f, "device_bus"),
            ChannelKind::ChatBot => write!(f, "chat_bot"),
            ChannelKind::MessagingApp => write!(f, "messaging_app"),
        }
    }
}

/// Channels a user may choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserChannel {
    ChatBot,
    MessagingApp,
}

impl UserChannel {
    /// Interpret a stored preference. Unknown or empty values yield `None`.
    pub fn from_preference(preference: &str) -> Option<Self> {
        match preference.trim().to_ascii_lowercase().as_str() {
            "telegram" | "chatbot" | "chat_bot" => Some(UserChannel::ChatBot),
            "wa" | "whatsapp" | "messaging_app" => Some(UserChannel::MessagingApp),
            _ => None,
        }
    }
}

impl From<UserChannel> for ChannelKind {
    fn from(value: UserChannel) -> Self {
        match value {
            UserChannel::ChatBot => ChannelKind::ChatBot,
            UserChannel::MessagingApp => ChannelKind::MessagingApp,
        }
    }
}

/// Where a single alert goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub channel: ChannelKind,
    pub address: String,
}

/// A recipient with a validated location.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipient {
    Device {
        id: String,
        location: Coordinate,
    },
    User {
        id: String,
        identifier: String,
        location: Coordinate,
        channel: Option<UserChannel>,
    },
}

impl Recipient {
    pub fn id(&self) -> &str {
        match self {
            Recipient::Device { id, .. } | Recipient::User { id, .. } => id,
        }
    }

    pub fn kind(&self) -> RecipientKind {
        match self {
            Recipient::Device { .. } => RecipientKind::Device,
            Recipient::User { .. } => RecipientKind::User,
        }
    }

    pub fn location(&self) -> Coordinate {
        match self {
            Recipient::Device { location, .. } | Recipient::User { location, .. } => *location,
        }
    }

    /// The channel and address an alert for this recipient is sent to.
    ///
    /// Devices always use the device bus addressed by their id. Users without
    /// a recognised preference have no route.
    pub fn route(&self) -> Option<Route> {
        match self {
            Recipient::Device { id, .. } => Some(Route {
                channel: ChannelKind::DeviceBus,
                address: id.clone(),
            }),
            Recipient::User {
                identifier,
                channel,
                ..
            } => channel.map(|c| Route {
                channel: c.into(),
                address: identifier.clone(),
            }),
        }
    }
}

fn parse_location(
    kind: RecipientKind,
    id: &str,
    latitude: Option<&str>,
    longitude: Option<&str>,
) -> Result<Coordinate, ParseError> {
    latitude
        .and_then(parse_coordinate_component)
        .zip(longitude.and_then(parse_coordinate_component))
        .and_then(|(lat, lon)| Coordinate::new(lat, lon))
        .ok_or_else(|| ParseError::RecipientLocation {
            kind,
            id: id.to_string(),
            latitude: latitude.unwrap_or_default().to_string(),
            longitude: longitude.unwrap_or_default().to_string(),
        })
}

impl TryFrom<&DeviceRecord> for Recipient {
    type Error = ParseError;

    fn try_from(record: &DeviceRecord) -> Result<Self, ParseError> {
        let location = parse_location(
            RecipientKind::Device,
            &record.id,
            record.latitude.as_deref(),
            record.longitude.as_deref(),
        )?;
        Ok(Recipient::Device {
            id: record.id.clone(),
            location,
        })
    }
}

impl TryFrom<&UserRecord> for Recipient {
    type Error = ParseError;

    fn try_from(record: &UserRecord) -> Result<Self, ParseError> {
        let location = parse_location(
            RecipientKind::User,
            &record.id,
            record.latitude.as_deref(),
            record.longitude.as_deref(),
        )?;
        Ok(Recipient::User {
            id: record.id.clone(),
            identifier: record.identifier.clone(),
            location,
            channel: record
                .channel
                .as_deref()
                .and_then(UserChannel::from_preference),
        })
    }
}

#[derive(Debug, Clone, Copy)]
/// All registered devices in enumeration order.
pub struct ListDeviceRecords;

impl Processor<ListDeviceRecords> for DatabaseProcessor {
    type Output = Vec<DeviceRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListDeviceRecords")]
    async fn process(&self, _: ListDeviceRecords) -> Result<Vec<DeviceRecord>, sqlx::Error> {
        sqlx::query_as::<_, DeviceRecord>(
            r#"
            SELECT id, latitude, longitude
            FROM iot_devices
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
/// All subscribed users in enumeration order.
pub struct ListUserRecords;

impl Processor<ListUserRecords> for DatabaseProcessor {
    type Output = Vec<UserRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListUserRecords")]
    async fn process(&self, _: ListUserRecords) -> Result<Vec<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, identifier, latitude, longitude, channel
            FROM user_notify
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Store a self-registered device.
pub struct InsertDeviceRecord {
    pub id: String,
    pub location: Coordinate,
}

impl Processor<InsertDeviceRecord> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertDeviceRecord")]
    async fn process(&self, query: InsertDeviceRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO iot_devices (id, latitude, longitude)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&query.id)
        .bind(query.location.lat().to_string())
        .bind(query.location.lon().to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Create a chat-bot subscriber, or move every row already keyed by the
/// same chat id to the new location.
///
/// `id` is only used when a new row is inserted.
pub struct UpsertChatBotUser {
    pub id: String,
    pub chat_id: i64,
    pub location: Coordinate,
}

impl Processor<UpsertChatBotUser> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertChatBotUser")]
    async fn process(&self, query: UpsertChatBotUser) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            WITH moved AS (
                UPDATE user_notify
                SET latitude = $3, longitude = $4, channel = 'telegram'
                WHERE identifier = $2
                RETURNING id
            )
            INSERT INTO user_notify (id, identifier, latitude, longitude, channel)
            SELECT $1, $2, $3, $4, 'telegram'
            WHERE NOT EXISTS (SELECT 1 FROM moved)
            "#,
        )
        .bind(&query.id)
        .bind(query.chat_id.to_string())
        .bind(query.location.lat().to_string())
        .bind(query.location.lon().to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
