use super::{AlertChannel, DispatchError, RegistrationAck};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the request queue between publishers and the event loop.
const REQUEST_CAPACITY: usize = 100;

/// Bound on flushing queued publishes once shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Topics used by devices to register themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationTopics {
    /// Devices publish `"lat,lon"` here.
    pub request: String,
    /// The assigned device id is published here.
    pub ack: String,
}

/// Connection settings for the device bus broker.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Devices are addressed as `{topic_prefix}/{device_id}`.
    pub topic_prefix: String,
    pub keep_alive: Duration,
    /// `None` disables device self-registration.
    pub registration: Option<RegistrationTopics>,
}

/// Topic a device listens on.
pub fn device_topic(prefix: &str, device_id: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), device_id)
}

/// Device bus over MQTT.
///
/// Publishing only enqueues the packet; delivery is acknowledged by the
/// broker according to QoS 1 and driven by a background event-loop task.
/// On shutdown that task flushes the queue and disconnects cleanly.
pub struct MqttDeviceBus {
    client: AsyncClient,
    topic_prefix: String,
    ack_topic: Option<String>,
}

impl MqttDeviceBus {
    /// Create the client and spawn the task driving its event loop.
    ///
    /// Registration payloads received on the request topic are forwarded
    /// to `registrations`. The task keeps reconnecting on errors until
    /// `shutdown_rx` flips to `true` or its sender is dropped.
    pub fn connect(
        settings: MqttSettings,
        registrations: Option<mpsc::Sender<Vec<u8>>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let mut options = MqttOptions::new(settings.client_id, settings.host, settings.port);
        options.set_keep_alive(settings.keep_alive);
        if let Some(username) = settings.username {
            options.set_credentials(username, settings.password.unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let inbound = settings
            .registration
            .as_ref()
            .zip(registrations)
            .map(|(topics, tx)| (topics.request.clone(), tx));
        let handle = tokio::spawn(drive_event_loop(
            eventloop,
            client.clone(),
            inbound,
            shutdown_rx,
        ));

        (
            Self {
                client,
                topic_prefix: settings.topic_prefix,
                ack_topic: settings.registration.map(|t| t.ack),
            },
            handle,
        )
    }

    async fn publish(&self, topic: String, payload: Vec<u8>) -> Result<(), DispatchError> {
        self.client
            .publish(topic.clone(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|source| DispatchError::Publish {
                topic: topic.clone(),
                source,
            })?;
        debug!(%topic, "Queued device bus publish");
        Ok(())
    }
}

#[async_trait]
impl AlertChannel for MqttDeviceBus {
    async fn send(&self, identifier: &str, message: &str) -> Result<(), DispatchError> {
        let topic = device_topic(&self.topic_prefix, identifier);
        self.publish(topic, message.as_bytes().to_vec()).await
    }
}

#[async_trait]
impl RegistrationAck for MqttDeviceBus {
    async fn acknowledge(&self, device_id: &str) -> Result<(), DispatchError> {
        let Some(topic) = &self.ack_topic else {
            return Ok(());
        };
        self.publish(topic.clone(), device_id.as_bytes().to_vec()).await
    }
}

async fn drive_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    inbound: Option<(String, mpsc::Sender<Vec<u8>>)>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Device bus event loop started");

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Device bus event loop received shutdown signal");
                    break;
                }
            }

            polled = eventloop.poll() => {
                match polled {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Device bus connected");
                        if let Some((topic, _)) = &inbound {
                            // Sessions are clean, so every reconnect subscribes again.
                            if let Err(e) = client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
                                warn!(%topic, error = %e, "Failed to subscribe to registration topic");
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if let Some((topic, tx)) = &inbound {
                            if publish.topic == *topic && tx.try_send(publish.payload.to_vec()).is_err() {
                                warn!(%topic, "Registration queue full or closed, dropping request");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Device bus connection error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    flush_and_disconnect(&mut eventloop, &client).await;
    info!("Device bus event loop stopped");
}

/// Queue a disconnect behind any pending publishes and poll until it is
/// written, the connection fails, or [`DRAIN_TIMEOUT`] elapses.
async fn flush_and_disconnect(eventloop: &mut EventLoop, client: &AsyncClient) {
    let drain = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(e),
            }
        }
    };
    let flush = async {
        let (requested, drained) = tokio::join!(client.disconnect(), drain);
        if let Err(e) = requested {
            warn!(error = %e, "Failed to request device bus disconnect");
        }
        drained
    };

    match tokio::time::timeout(DRAIN_TIMEOUT, flush).await {
        Ok(Ok(())) => info!("Device bus flushed and disconnected"),
        Ok(Err(e)) => warn!(error = %e, "Device bus closed before queued publishes were flushed"),
        Err(_) => warn!(timeout = ?DRAIN_TIMEOUT, "Timed out flushing device bus"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    /// A decoded MQTT 3.1.1 control packet: first header byte plus body.
    #[derive(Debug)]
    struct RawPacket {
        header: u8,
        body: Vec<u8>,
    }

    impl RawPacket {
        fn kind(&self) -> u8 {
            self.header >> 4
        }

        /// Topic and payload of a PUBLISH.
        fn publish(&self) -> (String, Vec<u8>) {
            let len = u16::from_be_bytes([self.body[0], self.body[1]]) as usize;
            let topic = String::from_utf8(self.body[2..2 + len].to_vec()).unwrap();
            let qos = (self.header >> 1) & 0b11;
            let start = 2 + len + if qos > 0 { 2 } else { 0 };
            (topic, self.body[start..].to_vec())
        }
    }

    async fn read_packet(stream: &mut TcpStream) -> Option<RawPacket> {
        let header = stream.read_u8().await.ok()?;
        let mut remaining = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.ok()?;
            remaining |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0; remaining];
        stream.read_exact(&mut body).await.ok()?;
        Some(RawPacket { header, body })
    }

    /// Accept one client, acknowledge its CONNECT, optionally push a
    /// PUBLISH once it subscribes, and record everything until it leaves.
    async fn fake_broker(listener: TcpListener, push: Option<(&'static str, &'static [u8])>) -> Vec<RawPacket> {
        let (mut stream, _) = listener.accept().await.unwrap();
        let connect = read_packet(&mut stream).await.unwrap();
        assert_eq!(connect.kind(), 1);
        stream.write_all(&CONNACK).await.unwrap();

        let mut seen = Vec::new();
        while let Some(packet) = read_packet(&mut stream).await {
            match packet.kind() {
                // PUBLISH QoS 1 wants a PUBACK.
                3 if (packet.header >> 1) & 0b11 == 1 => {
                    let len = u16::from_be_bytes([packet.body[0], packet.body[1]]) as usize;
                    let pkid = &packet.body[2 + len..4 + len];
                    stream.write_all(&[0x40, 0x02, pkid[0], pkid[1]]).await.unwrap();
                }
                // SUBSCRIBE: grant QoS 1, then deliver the pushed message.
                8 => {
                    let pkid = [packet.body[0], packet.body[1]];
                    stream.write_all(&[0x90, 0x03, pkid[0], pkid[1], 0x01]).await.unwrap();
                    if let Some((topic, payload)) = push {
                        let mut frame = vec![0x30, (2 + topic.len() + payload.len()) as u8];
                        frame.extend_from_slice(&(topic.len() as u16).to_be_bytes());
                        frame.extend_from_slice(topic.as_bytes());
                        frame.extend_from_slice(payload);
                        stream.write_all(&frame).await.unwrap();
                    }
                }
                _ => {}
            }
            let done = packet.kind() == 14;
            seen.push(packet);
            if done {
                break;
            }
        }
        seen
    }

    fn settings(port: u16, registration: Option<RegistrationTopics>) -> MqttSettings {
        MqttSettings {
            host: "127.0.0.1".to_string(),
            port,
            client_id: "quakewatch-test".to_string(),
            username: None,
            password: None,
            topic_prefix: "device".to_string(),
            keep_alive: Duration::from_secs(30),
            registration,
        }
    }

    #[test]
    fn test_device_topic() {
        assert_eq!(device_topic("device", "abc"), "device/abc");
        assert_eq!(device_topic("alerts/devices/", "abc"), "alerts/devices/abc");
    }

    #[tokio::test]
    async fn test_queued_alerts_are_flushed_before_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = tokio::spawn(fake_broker(listener, None));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (bus, handle) = MqttDeviceBus::connect(settings(port, None), None, shutdown_rx);
        bus.send("dev-1", "ALARM").await.unwrap();
        bus.send("dev-2", "ALARM").await.unwrap();

        // Shut down before the event loop has had a chance to write anything.
        shutdown_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(10), broker)
            .await
            .unwrap()
            .unwrap();
        let published: Vec<_> = seen
            .iter()
            .filter(|p| p.kind() == 3)
            .map(RawPacket::publish)
            .collect();
        assert_eq!(
            published,
            vec![
                ("device/dev-1".to_string(), b"ALARM".to_vec()),
                ("device/dev-2".to_string(), b"ALARM".to_vec()),
            ]
        );
        assert_eq!(seen.last().map(RawPacket::kind), Some(14));
    }

    #[tokio::test]
    async fn test_registration_requests_are_forwarded_and_acknowledged() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = tokio::spawn(fake_broker(listener, Some(("device/register/iot", &b"-6.2,106.8"[..]))));

        let topics = RegistrationTopics {
            request: "device/register/iot".to_string(),
            ack: "device/registered".to_string(),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (registration_tx, mut registration_rx) = mpsc::channel(4);
        let (bus, handle) =
            MqttDeviceBus::connect(settings(port, Some(topics)), Some(registration_tx), shutdown_rx);

        let payload = tokio::time::timeout(Duration::from_secs(10), registration_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload, b"-6.2,106.8");

        bus.acknowledge("dev-9").await.unwrap();
        shutdown_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(10), broker)
            .await
            .unwrap()
            .unwrap();
        assert!(seen.iter().any(|p| p.kind() == 8));
        let acks: Vec<_> = seen
            .iter()
            .filter(|p| p.kind() == 3)
            .map(RawPacket::publish)
            .collect();
        assert_eq!(acks, vec![("device/registered".to_string(), b"dev-9".to_vec())]);
    }
}
