//! MQTT backend built on `rumqttc`'s synchronous client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};

use super::{Message, PubSub, TransportError};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Connection to an MQTT broker, QoS 0 (at most once).
///
/// A driver thread polls the event loop, forwards incoming publishes to an
/// internal channel, and resubscribes after every (re)connect since the
/// session is not persistent.
pub struct MqttBus {
    client: Client,
    topics: Arc<Mutex<Vec<String>>>,
    closing: Arc<AtomicBool>,
    incoming: Receiver<Message>,
    driver: Option<JoinHandle<()>>,
}

impl MqttBus {
    /// Connects to `host:port` as `client_id`.
    ///
    /// The connection is established in the background; publishes issued
    /// before it completes are queued.
    pub fn connect(host: &str, port: u16, client_id: &str) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);
        let (client, connection) = Client::new(options, REQUEST_CAPACITY);

        let topics = Arc::new(Mutex::new(Vec::new()));
        let closing = Arc::new(AtomicBool::new(false));
        let (tx, incoming) = mpsc::channel();

        let driver = {
            let client = client.clone();
            let topics = Arc::clone(&topics);
            let closing = Arc::clone(&closing);
            thread::spawn(move || drive(connection, client, topics, closing, tx))
        };

        info!(host, port, client_id, "connecting to broker");
        Self {
            client,
            topics,
            closing,
            incoming,
            driver: Some(driver),
        }
    }
}

fn drive(
    mut connection: Connection,
    client: Client,
    topics: Arc<Mutex<Vec<String>>>,
    closing: Arc<AtomicBool>,
    tx: mpsc::Sender<Message>,
) {
    for notification in connection.iter() {
        if closing.load(Ordering::SeqCst) {
            break;
        }
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to broker");
                let topics = topics.lock().map(|t| t.clone()).unwrap_or_default();
                for topic in topics {
                    if let Err(err) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                        warn!(%err, topic = %topic, "resubscribe failed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = Message {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
            Ok(event) => debug!(?event, "mqtt event"),
            Err(err) => {
                if closing.load(Ordering::SeqCst) {
                    break;
                }
                warn!(%err, "broker connection error, retrying");
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }
    debug!("mqtt driver stopped");
}

impl PubSub for MqttBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| TransportError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if let Ok(mut topics) = self.topics.lock() {
            if !topics.iter().any(|t| t == topic) {
                topics.push(topic.to_string());
            }
        }
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn next_message(&mut self, timeout: Duration) -> Result<Option<Message>, TransportError> {
        match self.incoming.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self
            .client
            .disconnect()
            .map_err(|e| TransportError::Connect(e.to_string()));
        if let Some(driver) = self.driver.take() {
            if driver.join().is_err() {
                warn!("mqtt driver thread panicked");
            }
        }
        info!("disconnected from broker");
        result
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        if !self.closing.load(Ordering::SeqCst) {
            let _ = self.disconnect();
        }
    }
}
