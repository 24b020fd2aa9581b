use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::{Message, PubSub, TransportError};

#[derive(Debug, Default)]
struct Broker {
    queue: VecDeque<Message>,
}

/// In-process bus for tests and the demo pipeline.
///
/// Handles created with [`InMemoryBus::connect`] share one broker queue.
/// A handle only receives topics it subscribed to; messages on other
/// topics are dropped when it reads them.
#[derive(Debug, Clone)]
pub struct InMemoryBus {
    broker: Arc<(Mutex<Broker>, Condvar)>,
    topics: HashSet<String>,
    closed: bool,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            broker: Arc::new((Mutex::new(Broker::default()), Condvar::new())),
            topics: HashSet::new(),
            closed: false,
        }
    }

    /// Opens another connection to the same broker.
    pub fn connect(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            topics: HashSet::new(),
            closed: false,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Broker>, TransportError> {
        self.broker.0.lock().map_err(|_| TransportError::Closed)
    }

    /// Messages waiting in the broker queue.
    pub fn pending(&self) -> usize {
        self.lock().map(|b| b.queue.len()).unwrap_or(0)
    }

    fn pop_matching(&self, broker: &mut Broker) -> Option<Message> {
        while let Some(message) = broker.queue.pop_front() {
            if self.topics.contains(&message.topic) {
                return Some(message);
            }
        }
        None
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub for InMemoryBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut broker = self.lock()?;
        broker.queue.push_back(Message {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        self.broker.1.notify_all();
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.topics.insert(topic.to_string());
        Ok(())
    }

    fn next_message(&mut self, timeout: Duration) -> Result<Option<Message>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut broker = self.lock()?;
        if let Some(message) = self.pop_matching(&mut broker) {
            return Ok(Some(message));
        }
        let (mut broker, _) = self
            .broker
            .1
            .wait_timeout_while(broker, timeout, |b| b.queue.is_empty())
            .map_err(|_| TransportError::Closed)?;
        Ok(self.pop_matching(&mut broker))
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.topics.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "smartgrid/data";

    #[test]
    fn delivers_in_publish_order() {
        let publisher = InMemoryBus::new();
        let mut subscriber = publisher.connect();
        subscriber.subscribe(TOPIC).unwrap();

        publisher.publish(TOPIC, b"one").unwrap();
        publisher.publish(TOPIC, b"two").unwrap();

        let first = subscriber.next_message(Duration::ZERO).unwrap().unwrap();
        let second = subscriber.next_message(Duration::ZERO).unwrap().unwrap();
        assert_eq!(first.payload, b"one");
        assert_eq!(second.payload, b"two");
    }

    #[test]
    fn times_out_when_empty() {
        let mut bus = InMemoryBus::new();
        bus.subscribe(TOPIC).unwrap();
        let got = bus.next_message(Duration::from_millis(5)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn other_topics_are_dropped() {
        let publisher = InMemoryBus::new();
        let mut subscriber = publisher.connect();
        subscriber.subscribe(TOPIC).unwrap();

        publisher.publish("other/topic", b"x").unwrap();
        publisher.publish(TOPIC, b"y").unwrap();

        let got = subscriber.next_message(Duration::ZERO).unwrap().unwrap();
        assert_eq!(got.payload, b"y");
        assert_eq!(publisher.pending(), 0);
    }

    #[test]
    fn disconnect_closes_handle() {
        let mut bus = InMemoryBus::new();
        bus.disconnect().unwrap();
        assert!(matches!(bus.publish(TOPIC, b"x"), Err(TransportError::Closed)));
        assert!(matches!(
            bus.next_message(Duration::ZERO),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn wakes_on_publish_from_other_thread() {
        let publisher = InMemoryBus::new();
        let mut subscriber = publisher.connect();
        subscriber.subscribe(TOPIC).unwrap();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            publisher.publish(TOPIC, b"late").unwrap();
        });

        let got = subscriber.next_message(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert_eq!(got.map(|m| m.payload), Some(b"late".to_vec()));
    }
}
