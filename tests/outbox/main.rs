//! Outbox capture and dispatch against in-memory storage and broker.

#[path = "../support/mod.rs"]
mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use outbox_relay::broker::InMemoryBroker;
use outbox_relay::configuration::OutboxConfiguration;
use outbox_relay::outbox::{
    InMemoryOutboxRepository, OutboxDispatcher, OutboxDispatcherThread, OutboxEntry,
    OutboxNotification, OutboxProducer, OutboxUnitOfWork, OutboxUnitOfWorkFactory,
};
use outbox_relay::{
    AnyMessage, CancellationToken, Metadata, OutboxOptions, ProduceError, RepositoryError,
    Services,
};
use serde_json::Value;

use support::{init_tracing, order_placed, wait_until, OrderPlaced, OrderShipped};

const WAIT: Duration = Duration::from_secs(2);

fn outbox() -> OutboxOptions {
    OutboxOptions::new()
        .register::<OrderPlaced, _>("orders", "order_placed", |e| e.order_id.clone())
        .register::<OrderShipped, _>("shipments", "order_shipped", |e| e.order_id.clone())
}

fn dispatcher(repository: &InMemoryOutboxRepository, broker: &InMemoryBroker) -> OutboxDispatcher {
    OutboxDispatcher::new(
        Arc::new(repository.clone()),
        OutboxProducer::new(Arc::new(broker.clone()), Services::new()),
    )
}

/// In-memory storage whose next commits or marks fail.
#[derive(Default)]
struct FlakyStorage {
    repository: InMemoryOutboxRepository,
    failing_commits: AtomicUsize,
    failing_marks: AtomicUsize,
}

impl FlakyStorage {
    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

struct FlakyUnitOfWork<'a> {
    inner: Box<dyn OutboxUnitOfWork + 'a>,
    storage: &'a FlakyStorage,
}

impl OutboxUnitOfWork for FlakyUnitOfWork<'_> {
    fn unpublished_entries(&mut self) -> Result<Vec<OutboxEntry>, RepositoryError> {
        self.inner.unpublished_entries()
    }

    fn mark_as_processed(&mut self, message_id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if FlakyStorage::take(&self.storage.failing_marks) {
            return Err(RepositoryError::Storage("mark lost".into()));
        }
        self.inner.mark_as_processed(message_id, at)
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        if FlakyStorage::take(&self.storage.failing_commits) {
            return Err(RepositoryError::Storage("crash".into()));
        }
        self.inner.commit()
    }
}

impl OutboxUnitOfWorkFactory for FlakyStorage {
    fn begin(&self) -> Result<Box<dyn OutboxUnitOfWork + '_>, RepositoryError> {
        Ok(Box::new(FlakyUnitOfWork {
            inner: self.repository.begin()?,
            storage: self,
        }))
    }
}

fn enqueue_committed(outbox: &OutboxConfiguration, repository: &InMemoryOutboxRepository, messages: Vec<AnyMessage>) {
    let tx = repository.begin_transaction();
    outbox
        .queue(Arc::new(tx.clone()), Services::new())
        .enqueue(messages)
        .unwrap();
    tx.commit().unwrap();
}

fn envelope(data: &str) -> Value {
    serde_json::from_str(data).unwrap()
}

#[test]
fn entries_become_visible_on_commit_only() {
    init_tracing();
    let outbox = outbox().build();
    let repository = InMemoryOutboxRepository::new();

    let tx = repository.begin_transaction();
    outbox
        .queue(Arc::new(tx.clone()), Services::new())
        .enqueue_one(order_placed("1", 5))
        .unwrap();

    assert!(repository.entries().unwrap().is_empty());
    assert_eq!(tx.staged().unwrap(), 1);

    tx.commit().unwrap();
    let entries = repository.pending().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].topic, "orders");
    assert_eq!(entries[0].key.as_deref(), Some("1"));
    assert!(entries[0].processed_utc.is_none());
}

#[test]
fn rolled_back_entries_are_never_published() {
    init_tracing();
    let outbox = outbox().build();
    let repository = InMemoryOutboxRepository::new();
    let broker = InMemoryBroker::new();

    let tx = repository.begin_transaction();
    outbox
        .queue(Arc::new(tx.clone()), Services::new())
        .enqueue_one(order_placed("1", 5))
        .unwrap();
    tx.rollback().unwrap();

    let result = dispatcher(&repository, &broker)
        .dispatch(&CancellationToken::new())
        .unwrap();

    assert_eq!(result.published, 0);
    assert!(repository.entries().unwrap().is_empty());
    assert!(broker.messages("orders").is_empty());
}

#[test]
fn dispatch_publishes_in_enqueue_order_and_marks_entries() {
    init_tracing();
    let outbox = outbox().build();
    let repository = InMemoryOutboxRepository::new();
    let broker = InMemoryBroker::new();

    enqueue_committed(
        &outbox,
        &repository,
        vec![
            AnyMessage::new(order_placed("foo", 1)),
            AnyMessage::new(order_placed("bar", 2)),
            AnyMessage::new(order_placed("baz", 3)),
        ],
    );
    let ids: Vec<String> = repository
        .entries()
        .unwrap()
        .iter()
        .map(|entry| entry.message_id.to_string())
        .collect();

    let result = dispatcher(&repository, &broker)
        .dispatch(&CancellationToken::new())
        .unwrap();

    assert_eq!(result.published, 3);
    assert!(repository.pending().unwrap().is_empty());

    let published = broker.messages("orders");
    let keys: Vec<_> = published.iter().map(|m| m.key.clone().unwrap()).collect();
    assert_eq!(keys, vec!["foo", "bar", "baz"]);

    let first = envelope(&published[0].data);
    assert_eq!(first["messageId"], Value::String(ids[0].clone()));
    assert_eq!(first["type"], "order_placed");
    assert_eq!(first["data"]["orderId"], "foo");
    assert_eq!(first["correlationId"], Value::String(ids[0].clone()));
}

#[test]
fn failed_entries_stay_pending_until_a_later_cycle() {
    init_tracing();
    let outbox = outbox().build();
    let repository = InMemoryOutboxRepository::new();
    let broker = InMemoryBroker::new();
    enqueue_committed(
        &outbox,
        &repository,
        vec![
            AnyMessage::new(order_placed("foo", 1)),
            AnyMessage::new(order_placed("bar", 2)),
        ],
    );
    let dispatcher = dispatcher(&repository, &broker);

    broker.fail_next_produce(ProduceError::new("broker unavailable", "Local_Transport"));
    let first = dispatcher.dispatch(&CancellationToken::new()).unwrap();

    assert_eq!(first.published, 1);
    assert_eq!(first.failed, 1);
    let pending = repository.pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key.as_deref(), Some("foo"));

    let second = dispatcher.dispatch(&CancellationToken::new()).unwrap();

    assert_eq!(second.published, 1);
    assert!(repository.pending().unwrap().is_empty());
    let keys: Vec<_> = broker
        .messages("orders")
        .into_iter()
        .map(|m| m.key.unwrap())
        .collect();
    assert_eq!(keys, vec!["bar", "foo"]);
}

#[test]
fn crash_before_marks_are_persisted_republishes_the_entry() {
    init_tracing();
    let outbox = OutboxOptions::new()
        .register::<OrderShipped, _>("foo", "order_shipped", |_| "bar".to_string())
        .build();
    let storage = Arc::new(FlakyStorage::default());
    storage.failing_commits.store(1, Ordering::SeqCst);
    let broker = InMemoryBroker::new();
    enqueue_committed(
        &outbox,
        &storage.repository,
        vec![AnyMessage::new(OrderShipped {
            order_id: "baz".into(),
        })],
    );
    let dispatcher = OutboxDispatcher::new(
        storage.clone(),
        OutboxProducer::new(Arc::new(broker.clone()), Services::new()),
    );

    let first = dispatcher.dispatch(&CancellationToken::new());

    assert!(matches!(first, Err(outbox_relay::Error::Repository(_))));
    assert_eq!(storage.repository.pending().unwrap().len(), 1);

    let second = dispatcher.dispatch(&CancellationToken::new()).unwrap();

    assert_eq!(second.published, 1);
    assert!(storage.repository.pending().unwrap().is_empty());
    let published = broker.messages("foo");
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].data, published[1].data);
    for message in &published {
        assert_eq!(message.key.as_deref(), Some("bar"));
        assert_eq!(envelope(&message.data)["data"]["orderId"], "baz");
    }
}

#[test]
fn failed_mark_leaves_the_rest_of_the_batch_processed() {
    init_tracing();
    let outbox = outbox().build();
    let storage = Arc::new(FlakyStorage::default());
    storage.failing_marks.store(1, Ordering::SeqCst);
    let broker = InMemoryBroker::new();
    enqueue_committed(
        &outbox,
        &storage.repository,
        vec![
            AnyMessage::new(order_placed("foo", 1)),
            AnyMessage::new(order_placed("bar", 2)),
        ],
    );
    let dispatcher = OutboxDispatcher::new(
        storage.clone(),
        OutboxProducer::new(Arc::new(broker.clone()), Services::new()),
    );

    let result = dispatcher.dispatch(&CancellationToken::new()).unwrap();

    assert_eq!(result.published, 1);
    assert_eq!(result.failed, 1);
    let pending = storage.repository.pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key.as_deref(), Some("foo"));
    assert_eq!(broker.messages("orders").len(), 2);
}

#[test]
fn headers_are_carried_into_the_envelope() {
    init_tracing();
    let outbox = outbox().build();
    let repository = InMemoryOutboxRepository::new();
    let broker = InMemoryBroker::new();

    let tx = repository.begin_transaction();
    outbox
        .queue(Arc::new(tx.clone()), Services::new())
        .enqueue_with(
            vec![AnyMessage::new(OrderShipped {
                order_id: "1".into(),
            })],
            Metadata::new()
                .with("correlationId", "c-1")
                .with("causationId", "m-0")
                .with("tenant", "acme"),
        )
        .unwrap();
    tx.commit().unwrap();
    dispatcher(&repository, &broker)
        .dispatch(&CancellationToken::new())
        .unwrap();

    let shipped = envelope(&broker.messages("shipments")[0].data);
    assert_eq!(shipped["type"], "order_shipped");
    assert_eq!(shipped["correlationId"], "c-1");
    assert_eq!(shipped["causationId"], "m-0");
    assert_eq!(shipped["tenant"], "acme");
}

#[test]
fn unregistered_messages_are_rejected_at_capture() {
    init_tracing();
    let outbox = OutboxOptions::new().build();
    let repository = InMemoryOutboxRepository::new();

    let result = outbox
        .queue(Arc::new(repository.clone()), Services::new())
        .enqueue_one(order_placed("1", 1));

    assert!(matches!(
        result,
        Err(outbox_relay::Error::UnregisteredOutgoingMessage(_))
    ));
    assert!(repository.entries().unwrap().is_empty());
}

#[test]
fn notification_wakes_the_dispatcher_thread() {
    init_tracing();
    let notification = Arc::new(OutboxNotification::new(Duration::from_secs(30)));
    let outbox = outbox().with_notifier(notification.clone()).build();
    let repository = InMemoryOutboxRepository::new();
    let broker = InMemoryBroker::new();
    let thread = OutboxDispatcherThread::spawn(notification, dispatcher(&repository, &broker));

    let tx = repository.begin_transaction();
    let notifier = outbox
        .queue(Arc::new(tx.clone()), Services::new())
        .enqueue_one(order_placed("1", 1))
        .unwrap();
    tx.commit().unwrap();
    notifier.notify(&CancellationToken::new()).unwrap();

    assert!(wait_until(WAIT, || broker.messages("orders").len() == 1));
    let stats = thread.stop();

    assert_eq!(stats.messages_published, 1);
    assert!(repository.pending().unwrap().is_empty());
}

#[test]
fn dispatcher_polls_when_nobody_notifies() {
    init_tracing();
    let outbox = outbox().build();
    let repository = InMemoryOutboxRepository::new();
    let broker = InMemoryBroker::new();
    let thread = OutboxDispatcherThread::spawn(
        Arc::new(OutboxNotification::new(Duration::from_millis(20))),
        dispatcher(&repository, &broker),
    );

    enqueue_committed(&outbox, &repository, vec![AnyMessage::new(order_placed("1", 1))]);

    assert!(wait_until(WAIT, || repository.pending().unwrap().is_empty()));
    let stats = thread.stop();

    assert_eq!(broker.messages("orders").len(), 1);
    assert!(stats.cycles >= 1);
}
