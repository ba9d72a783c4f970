use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::cancellation::CancellationToken;
use crate::configuration::Configuration;
use crate::consuming::{BrokerConsumer, BrokerConsumerFactory};
use crate::error::{Error, ProduceError};
use crate::message::{OutgoingRawMessage, RawMessage, TopicPartitionOffset};
use crate::producing::{BrokerProducer, BrokerProducerFactory};

const PARTITION: i32 = 0;
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A message appended to a topic log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMessage {
    pub key: Option<String>,
    pub data: String,
    pub offset: i64,
}

#[derive(Default)]
struct State {
    topics: RwLock<HashMap<String, Vec<StoredMessage>>>,
    committed: Mutex<HashMap<(String, String), i64>>,
    commits: Mutex<Vec<(String, TopicPartitionOffset)>>,
    failures: Mutex<VecDeque<ProduceError>>,
    producers_created: AtomicUsize,
}

/// An in-memory broker with one partition per topic.
///
/// Features:
/// - Topics are append-only logs shared by every client
/// - Committed offsets are tracked per consumer group
/// - Produce failures can be injected
///
/// Consumers without a committed offset start at the beginning of the log.
///
/// ```ignore
/// let broker = InMemoryBroker::new();
/// broker.produce(&OutgoingRawMessage::new("orders", Some("7".into()), payload))?;
///
/// let mut consumer = broker.consumer("order-service", false);
/// consumer.subscribe(&["orders".to_string()], false)?;
/// let message = consumer.receive(&token)?.expect("message");
/// consumer.commit(message.position.as_ref().unwrap())?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<State>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message as-is, bypassing injected failures.
    pub fn publish(&self, topic: &str, key: Option<&str>, data: impl Into<String>) {
        self.append(topic, key.map(str::to_string), data.into());
    }

    fn append(&self, topic: &str, key: Option<String>, data: String) -> i64 {
        let mut topics = self
            .state
            .topics
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let log = topics.entry(topic.to_string()).or_default();
        let offset = log.len() as i64;
        log.push(StoredMessage { key, data, offset });
        offset
    }

    /// All messages on `topic`, in offset order.
    pub fn messages(&self, topic: &str) -> Vec<StoredMessage> {
        self.state
            .topics
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Make the next produce call fail with `error`. Failures queue up.
    pub fn fail_next_produce(&self, error: ProduceError) {
        self.state
            .failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(error);
    }

    /// Explicit commits made by `group_id`, oldest first.
    pub fn commits(&self, group_id: &str) -> Vec<TopicPartitionOffset> {
        self.state
            .commits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(group, _)| group == group_id)
            .map(|(_, position)| position.clone())
            .collect()
    }

    /// Next offset `group_id` will read from `topic` after a restart.
    pub fn committed_offset(&self, group_id: &str, topic: &str) -> Option<i64> {
        self.state
            .committed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(group_id.to_string(), topic.to_string()))
            .copied()
    }

    fn store_offset(&self, group_id: &str, topic: &str, next_offset: i64) {
        self.state
            .committed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((group_id.to_string(), topic.to_string()), next_offset);
    }

    /// Number of producer clients handed out by [`producer_factory`](Self::producer_factory).
    pub fn producers_created(&self) -> usize {
        self.state.producers_created.load(Ordering::SeqCst)
    }

    /// A consumer client for `group_id`. With `auto_commit` offsets are
    /// stored as messages are received.
    pub fn consumer(&self, group_id: impl Into<String>, auto_commit: bool) -> InMemoryConsumer {
        InMemoryConsumer {
            broker: self.clone(),
            group_id: group_id.into(),
            auto_commit,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            topics: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Opens consumers configured by `group.id` and `enable.auto.commit`.
    pub fn consumer_factory(&self) -> Arc<dyn BrokerConsumerFactory> {
        let broker = self.clone();
        Arc::new(
            move |configuration: &Configuration| -> Result<Box<dyn BrokerConsumer>, Error> {
                let group_id = configuration.group_id().ok_or_else(|| {
                    Error::InvalidConfiguration("consumer configuration has no group.id".into())
                })?;
                Ok(Box::new(
                    broker.consumer(group_id, configuration.enable_auto_commit()),
                ))
            },
        )
    }

    /// Hands out this broker as the producer client and counts the calls.
    pub fn producer_factory(&self) -> Arc<dyn BrokerProducerFactory> {
        let broker = self.clone();
        Arc::new(
            move |_: &Configuration| -> Result<Arc<dyn BrokerProducer>, Error> {
                broker.state.producers_created.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(broker.clone()))
            },
        )
    }
}

impl BrokerProducer for InMemoryBroker {
    fn produce(&self, message: &OutgoingRawMessage) -> Result<(), ProduceError> {
        let failure = self
            .state
            .failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        let offset = self.append(&message.topic, message.key.clone(), message.data.clone());
        trace!(topic = %message.topic, offset, "Appended message");
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self
            .state
            .topics
            .read()
            .map(|topics| topics.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        f.debug_struct("InMemoryBroker").field("topics", &topics).finish()
    }
}

/// Consumer client of an [`InMemoryBroker`].
#[derive(Debug)]
pub struct InMemoryConsumer {
    broker: InMemoryBroker,
    group_id: String,
    auto_commit: bool,
    poll_timeout: Duration,
    topics: Vec<String>,
    positions: HashMap<String, i64>,
}

impl InMemoryConsumer {
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    fn next_message(&mut self) -> Option<RawMessage> {
        let topics = self
            .broker
            .state
            .topics
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for topic in &self.topics {
            let position = self.positions.entry(topic.clone()).or_insert(0);
            let Some(stored) = topics.get(topic).and_then(|log| log.get(*position as usize)) else {
                continue;
            };

            *position += 1;
            return Some(
                RawMessage::new(stored.key.clone(), stored.data.as_bytes().to_vec())
                    .with_position(TopicPartitionOffset::new(topic.clone(), PARTITION, stored.offset)),
            );
        }
        None
    }
}

impl BrokerConsumer for InMemoryConsumer {
    fn subscribe(&mut self, topics: &[String], read_from_beginning: bool) -> Result<(), Error> {
        self.topics = topics.to_vec();
        self.positions = topics
            .iter()
            .map(|topic| {
                let start = if read_from_beginning {
                    0
                } else {
                    self.broker
                        .committed_offset(&self.group_id, topic)
                        .unwrap_or(0)
                };
                (topic.clone(), start)
            })
            .collect();

        debug!(group_id = %self.group_id, topics = ?self.topics, read_from_beginning, "Subscribed");
        Ok(())
    }

    fn receive(&mut self, cancellation: &CancellationToken) -> Result<Option<RawMessage>, Error> {
        let deadline = Instant::now() + self.poll_timeout;

        loop {
            if let Some(message) = self.next_message() {
                if self.auto_commit {
                    if let Some(position) = &message.position {
                        self.broker
                            .store_offset(&self.group_id, &position.topic, position.offset + 1);
                    }
                }
                return Ok(Some(message));
            }

            if Instant::now() >= deadline || cancellation.wait_timeout(POLL_INTERVAL) {
                return Ok(None);
            }
        }
    }

    fn commit(&mut self, position: &TopicPartitionOffset) -> Result<(), Error> {
        self.broker
            .store_offset(&self.group_id, &position.topic, position.offset + 1);
        self.broker
            .state
            .commits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((self.group_id.clone(), position.clone()));
        Ok(())
    }
}
