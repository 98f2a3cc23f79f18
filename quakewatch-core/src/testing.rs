//! In-memory fakes of the collaborator traits and record builders.

use crate::collaborators::{
    ChatBotInbox, DirectoryError, EarthquakeFeed, EventStore, FeedError, RecipientDirectory,
    RecipientRegistry, StoreError,
};
use crate::dispatch::{AlertChannel, DispatchError, RegistrationAck};
use crate::entities::{ChannelKind, DeviceRecord, EarthquakeEvent, UserRecord};
use crate::geo::Coordinate;
use async_trait::async_trait;
use quakewatch_sdk::client::ClientError;
use quakewatch_sdk::objects::{Chat, Gempa, Location, Message, SendMessageRequest, Update};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use time::OffsetDateTime;

/// A site about 8 km from the sample epicenter; it feels the sample event.
pub const NEAR_SITE: (&str, &str) = ("-5.36", "123.16");

pub fn sample_report() -> Gempa {
    Gempa {
        tanggal: "17 Okt 2026".to_string(),
        jam: "10:11:12 WIB".to_string(),
        date_time: "2026-10-17T03:11:12+00:00".to_string(),
        coordinates: "-5.42,123.12".to_string(),
        lintang: "5.42 LS".to_string(),
        bujur: "123.12 BT".to_string(),
        magnitude: "3.2".to_string(),
        kedalaman: "10 km".to_string(),
        wilayah: "Pusat gempa berada di laut 20 km Tenggara Buton".to_string(),
        potensi: "Gempa tidak berpotensi tsunami".to_string(),
        dirasakan: "II Buton".to_string(),
        shakemap: "20261017101112.mmi.jpg".to_string(),
    }
}

pub fn sample_event() -> EarthquakeEvent {
    EarthquakeEvent::from_report(sample_report(), OffsetDateTime::UNIX_EPOCH).unwrap()
}

pub fn device(id: &str, latitude: &str, longitude: &str) -> DeviceRecord {
    DeviceRecord {
        id: id.to_string(),
        latitude: Some(latitude.to_string()),
        longitude: Some(longitude.to_string()),
    }
}

pub fn user(
    id: &str,
    identifier: &str,
    latitude: &str,
    longitude: &str,
    channel: Option<&str>,
) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        identifier: identifier.to_string(),
        latitude: Some(latitude.to_string()),
        longitude: Some(longitude.to_string()),
        channel: channel.map(str::to_string),
    }
}

/// Records every successful send; identifiers in `failing` are rejected.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl RecordingChannel {
    pub fn failing(identifiers: &[&str]) -> Self {
        Self {
            failing: identifiers.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    async fn send(&self, identifier: &str, message: &str) -> Result<(), DispatchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(identifier) {
            return Err(DispatchError::Client {
                channel: ChannelKind::ChatBot,
                identifier: identifier.to_string(),
                source: ClientError::Rejected("unreachable".to_string()),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((identifier.to_string(), message.to_string()));
        Ok(())
    }
}

pub struct FakeDirectory {
    devices: Vec<DeviceRecord>,
    users: Vec<UserRecord>,
    fail_devices: bool,
}

impl FakeDirectory {
    pub fn new(devices: Vec<DeviceRecord>, users: Vec<UserRecord>) -> Self {
        Self {
            devices,
            users,
            fail_devices: false,
        }
    }

    pub fn failing_devices(mut self) -> Self {
        self.fail_devices = true;
        self
    }
}

#[async_trait]
impl RecipientDirectory for FakeDirectory {
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, DirectoryError> {
        if self.fail_devices {
            return Err(DirectoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.devices.clone())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        Ok(self.users.clone())
    }
}

/// Replays queued results, then repeats `fallback` (or fails) forever.
pub struct FakeFeed {
    queue: Mutex<VecDeque<Result<EarthquakeEvent, FeedError>>>,
    fallback: Option<EarthquakeEvent>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeFeed {
    pub fn always(event: EarthquakeEvent) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Some(event),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn sequence(results: Vec<Result<EarthquakeEvent, FeedError>>) -> Self {
        Self {
            queue: Mutex::new(results.into()),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EarthquakeFeed for FakeFeed {
    async fn fetch(&self) -> Result<EarthquakeEvent, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.queue.lock().unwrap().pop_front();
        match queued {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or(FeedError::Timeout(Duration::ZERO)),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<EarthquakeEvent>>,
    latest: Option<String>,
    fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_latest(identity: &str) -> Self {
        Self {
            latest: Some(identity.to_string()),
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<EarthquakeEvent> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn save_event(&self, event: &EarthquakeEvent) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.saved.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn latest_identity(&self) -> Result<Option<String>, StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let saved = self.saved.lock().unwrap();
        Ok(saved
            .last()
            .map(|e| e.identity().to_string())
            .or_else(|| self.latest.clone()))
    }
}

pub fn chat_update(
    update_id: i64,
    chat_id: i64,
    text: Option<&str>,
    location: Option<(f64, f64)>,
) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: update_id,
            chat: Chat { id: chat_id },
            text: text.map(str::to_string),
            location: location.map(|(latitude, longitude)| Location {
                latitude,
                longitude,
            }),
        }),
    }
}

/// Registry keeping registrations in memory; ids are sequential.
#[derive(Default)]
pub struct MemoryRegistry {
    devices: Mutex<Vec<(String, Coordinate)>>,
    users: Mutex<Vec<(i64, Coordinate)>>,
    fail: bool,
}

impl MemoryRegistry {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn devices(&self) -> Vec<(String, Coordinate)> {
        self.devices.lock().unwrap().clone()
    }

    pub fn users(&self) -> Vec<(i64, Coordinate)> {
        self.users.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecipientRegistry for MemoryRegistry {
    async fn register_device(&self, location: Coordinate) -> Result<String, DirectoryError> {
        if self.fail {
            return Err(DirectoryError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut devices = self.devices.lock().unwrap();
        let id = format!("dev-{}", devices.len() + 1);
        devices.push((id.clone(), location));
        Ok(id)
    }

    async fn register_chat_user(&self, chat_id: i64, location: Coordinate) -> Result<(), DirectoryError> {
        if self.fail {
            return Err(DirectoryError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut users = self.users.lock().unwrap();
        users.retain(|(id, _)| *id != chat_id);
        users.push((chat_id, location));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAck {
    acknowledged: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingAck {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrationAck for RecordingAck {
    async fn acknowledge(&self, device_id: &str) -> Result<(), DispatchError> {
        if self.fail {
            return Err(DispatchError::Timeout(Duration::from_secs(1)));
        }
        self.acknowledged.lock().unwrap().push(device_id.to_string());
        Ok(())
    }
}

/// Replays queued poll results, then waits out each long-poll empty-handed.
#[derive(Default)]
pub struct FakeInbox {
    polls: Mutex<VecDeque<Result<Vec<Update>, ClientError>>>,
    offsets: Mutex<Vec<Option<i64>>>,
    replies: Mutex<Vec<SendMessageRequest>>,
    fail_replies: bool,
    hang: bool,
}

impl FakeInbox {
    pub fn with_polls(polls: Vec<Result<Vec<Update>, ClientError>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Self::default()
        }
    }

    pub fn failing_replies(mut self) -> Self {
        self.fail_replies = true;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn offsets(&self) -> Vec<Option<i64>> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<SendMessageRequest> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBotInbox for FakeInbox {
    async fn poll(&self, offset: Option<i64>, wait: Duration) -> Result<Vec<Update>, ClientError> {
        self.offsets.lock().unwrap().push(offset);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let queued = self.polls.lock().unwrap().pop_front();
        match queued {
            Some(result) => result,
            None => {
                tokio::time::sleep(wait).await;
                Ok(Vec::new())
            }
        }
    }

    async fn reply(&self, request: &SendMessageRequest) -> Result<(), ClientError> {
        if self.fail_replies {
            return Err(ClientError::Rejected("Forbidden: bot was blocked by the user".to_string()));
        }
        self.replies.lock().unwrap().push(request.clone());
        Ok(())
    }
}
