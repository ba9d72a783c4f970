//! Consumer integration tests against the in-memory broker.

#[path = "../support/mod.rs"]
mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use outbox_relay::broker::InMemoryBroker;
use outbox_relay::configuration::Configuration;
use outbox_relay::consuming::{
    BrokerConsumer, ConsumerFailureStrategy, ConsumerThread, IgnoreUnconfiguredMessages, IncomingMessage,
    TransportLevelPoisonMessage,
};
use outbox_relay::message::TopicPartitionOffset;
use outbox_relay::{
    BoxError, CancellationToken, ConsumerOptions, Error, MessageHandler, MessageHandlerContext,
    Scope, Services,
};
use serde_json::json;

use support::{init_tracing, order_placed, wait_until, MessageHandlerSpy, OrderPlaced};

const TOPIC: &str = "orders";
const WAIT: Duration = Duration::from_secs(5);

fn envelope(message_id: &str, message_type: &str, data: serde_json::Value) -> String {
    json!({ "messageId": message_id, "type": message_type, "data": data }).to_string()
}

fn publish_order(broker: &InMemoryBroker, message_id: &str, order_id: &str) {
    broker.publish(
        TOPIC,
        Some(order_id),
        envelope(message_id, "order_placed", json!({ "orderId": order_id, "amount": 10 })),
    );
}

fn options(broker: &InMemoryBroker, group_id: &str) -> ConsumerOptions {
    ConsumerOptions::new()
        .with_group_id(group_id)
        .with_bootstrap_servers("localhost")
        .with_broker_consumer_factory(broker.consumer_factory())
}

fn manual_commit(options: ConsumerOptions) -> ConsumerOptions {
    options.with_configuration("enable.auto.commit", "false")
}

fn spawn(options: ConsumerOptions, services: Services, lifetime: &CancellationToken) -> ConsumerThread {
    let configuration = options.build().unwrap();
    ConsumerThread::spawn(
        configuration.consumer(services),
        configuration.error_handler(lifetime.clone()),
    )
}

#[test]
fn handles_messages_in_order_and_commits_each() {
    init_tracing();
    let broker = InMemoryBroker::new();
    publish_order(&broker, "m-1", "1");
    publish_order(&broker, "m-2", "2");
    let spy = MessageHandlerSpy::<OrderPlaced>::new();

    let thread = spawn(
        manual_commit(options(&broker, "billing"))
            .register_message_handler::<OrderPlaced, _>(TOPIC, "order_placed", spy.handler()),
        Services::new(),
        &CancellationToken::new(),
    );

    assert!(wait_until(WAIT, || broker.commits("billing").len() == 2));
    let stats = thread.stop();

    let handled = spy.handled();
    assert_eq!(handled[0].message, order_placed("1", 10));
    assert_eq!(handled[1].message_id, "m-2");
    assert_eq!(handled[1].correlation_id, "m-2");
    assert_eq!(
        broker.commits("billing"),
        vec![
            TopicPartitionOffset::new(TOPIC, 0, 0),
            TopicPartitionOffset::new(TOPIC, 0, 1)
        ]
    );
    assert_eq!(stats.messages_handled, 2);
    assert_eq!(stats.messages_failed, 0);
}

#[test]
fn auto_commit_leaves_committing_to_the_client() {
    init_tracing();
    let broker = InMemoryBroker::new();
    publish_order(&broker, "m-1", "1");
    let spy = MessageHandlerSpy::<OrderPlaced>::new();

    let thread = spawn(
        options(&broker, "billing")
            .register_message_handler::<OrderPlaced, _>(TOPIC, "order_placed", spy.handler()),
        Services::new(),
        &CancellationToken::new(),
    );

    assert!(wait_until(WAIT, || spy.count() == 1));
    thread.stop();

    assert!(broker.commits("billing").is_empty());
    assert_eq!(broker.committed_offset("billing", TOPIC), Some(1));
}

struct UnitOfWork {
    dropped: Arc<AtomicUsize>,
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScopedHandler {
    unit_of_work: Arc<UnitOfWork>,
    scopes: Arc<Mutex<Vec<String>>>,
}

impl MessageHandler<OrderPlaced> for ScopedHandler {
    fn handle(&self, _message: OrderPlaced, context: &MessageHandlerContext) -> Result<(), BoxError> {
        let again = context.scope().resolve::<UnitOfWork>()?;
        assert!(Arc::ptr_eq(&self.unit_of_work, &again));
        self.scopes
            .lock()
            .unwrap()
            .push(context.scope().id().to_string());
        Ok(())
    }
}

#[test]
fn every_message_gets_its_own_scope() {
    init_tracing();
    let broker = InMemoryBroker::new();
    publish_order(&broker, "m-1", "1");
    publish_order(&broker, "m-2", "2");

    let dropped = Arc::new(AtomicUsize::new(0));
    let services = {
        let dropped = dropped.clone();
        Services::new().scoped(move |_: &Scope| {
            Ok(UnitOfWork {
                dropped: dropped.clone(),
            })
        })
    };
    let scopes = Arc::new(Mutex::new(Vec::new()));
    let handler_scopes = scopes.clone();

    let thread = spawn(
        manual_commit(options(&broker, "billing")).register_scoped_message_handler::<OrderPlaced, _, _>(
            TOPIC,
            "order_placed",
            move |scope: &Scope| -> Result<ScopedHandler, Error> {
                Ok(ScopedHandler {
                    unit_of_work: scope.resolve::<UnitOfWork>()?,
                    scopes: handler_scopes.clone(),
                })
            },
        ),
        services,
        &CancellationToken::new(),
    );

    assert!(wait_until(WAIT, || broker.commits("billing").len() == 2));
    thread.stop();

    let scopes = scopes.lock().unwrap().clone();
    assert_eq!(scopes.len(), 2);
    assert_ne!(scopes[0], scopes[1]);
    assert_eq!(dropped.load(Ordering::SeqCst), 2);
}

#[test]
fn restart_policy_redelivers_the_failed_message() {
    init_tracing();
    let broker = InMemoryBroker::new();
    publish_order(&broker, "m-1", "1");

    let attempts = Arc::new(AtomicUsize::new(0));
    let handler_attempts = attempts.clone();
    let lifetime = CancellationToken::new();

    let thread = spawn(
        manual_commit(options(&broker, "billing"))
            .with_consumer_error_handler(|_| ConsumerFailureStrategy::RestartConsumer)
            .register_message_handler::<OrderPlaced, _>(
                TOPIC,
                "order_placed",
                move |_: OrderPlaced, _: &MessageHandlerContext| -> Result<(), BoxError> {
                    if handler_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err("database unavailable".into());
                    }
                    Ok(())
                },
            ),
        Services::new(),
        &lifetime,
    );

    assert!(wait_until(WAIT, || broker.commits("billing").len() == 1));
    let stats = thread.stop();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(stats.restarts, 1);
    assert_eq!(stats.messages_failed, 1);
    assert_eq!(stats.messages_handled, 1);
    assert!(!lifetime.is_cancelled());
}

#[test]
fn restarts_wait_between_failed_subscriptions() {
    init_tracing();
    let attempts = Arc::new(AtomicUsize::new(0));
    let factory_attempts = attempts.clone();
    let lifetime = CancellationToken::new();

    let thread = spawn(
        ConsumerOptions::new()
            .with_group_id("billing")
            .with_bootstrap_servers("unreachable:9092")
            .with_restart_delay(Duration::from_millis(50))
            .with_consumer_error_handler(|_| ConsumerFailureStrategy::RestartConsumer)
            .with_broker_consumer_factory(Arc::new(
                move |_: &Configuration| -> Result<Box<dyn BrokerConsumer>, Error> {
                    factory_attempts.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Broker("connection refused".into()))
                },
            ))
            .register_message_handler::<OrderPlaced, _>(
                TOPIC,
                "order_placed",
                |_: OrderPlaced, _: &MessageHandlerContext| -> Result<(), BoxError> { Ok(()) },
            ),
        Services::new(),
        &lifetime,
    );

    std::thread::sleep(Duration::from_millis(300));
    let stats = thread.stop();

    let attempts = attempts.load(Ordering::SeqCst);
    assert!(attempts >= 2, "consumer never restarted");
    assert!(attempts <= 10, "consumer restarted {} times without waiting", attempts);
    assert!(stats.restarts >= attempts - 1 && stats.restarts <= attempts);
    assert!(!lifetime.is_cancelled());
}

#[test]
fn default_policy_stops_the_application() {
    init_tracing();
    let broker = InMemoryBroker::new();
    publish_order(&broker, "m-1", "1");
    let lifetime = CancellationToken::new();

    let thread = spawn(
        manual_commit(options(&broker, "billing")).register_message_handler::<OrderPlaced, _>(
            TOPIC,
            "order_placed",
            |_: OrderPlaced, _: &MessageHandlerContext| -> Result<(), BoxError> {
                Err("boom".into())
            },
        ),
        Services::new(),
        &lifetime,
    );

    assert!(wait_until(WAIT, || thread.is_finished()));
    assert!(lifetime.is_cancelled());
    assert!(broker.commits("billing").is_empty());
    assert_eq!(thread.stop().restarts, 0);
}

#[test]
fn unconfigured_message_types_fail_without_a_strategy() {
    init_tracing();
    let broker = InMemoryBroker::new();
    broker.publish(TOPIC, None, envelope("m-1", "order_cancelled", json!({})));
    let lifetime = CancellationToken::new();

    let thread = spawn(
        manual_commit(options(&broker, "billing")).register_message_handler::<OrderPlaced, _>(
            TOPIC,
            "order_placed",
            MessageHandlerSpy::<OrderPlaced>::new().handler(),
        ),
        Services::new(),
        &lifetime,
    );

    assert!(wait_until(WAIT, || lifetime.is_cancelled()));
    assert_eq!(thread.stop().messages_failed, 1);
}

#[test]
fn unconfigured_message_types_can_be_ignored() {
    init_tracing();
    let broker = InMemoryBroker::new();
    broker.publish(TOPIC, None, envelope("m-1", "order_cancelled", json!({})));
    publish_order(&broker, "m-2", "2");
    let spy = MessageHandlerSpy::<OrderPlaced>::new();

    let thread = spawn(
        manual_commit(options(&broker, "billing"))
            .with_unconfigured_message_handling_strategy(IgnoreUnconfiguredMessages)
            .register_message_handler::<OrderPlaced, _>(TOPIC, "order_placed", spy.handler()),
        Services::new(),
        &CancellationToken::new(),
    );

    assert!(wait_until(WAIT, || broker.commits("billing").len() == 2));
    thread.stop();

    assert_eq!(spy.count(), 1);
}

#[test]
fn poison_messages_are_handled_and_committed() {
    init_tracing();
    let broker = InMemoryBroker::new();
    broker.publish(TOPIC, None, "{ not json");
    let poison = MessageHandlerSpy::<TransportLevelPoisonMessage>::new();

    let thread = spawn(
        manual_commit(options(&broker, "billing"))
            .with_poison_message_handling()
            .register_message_handler::<TransportLevelPoisonMessage, _>(
                TOPIC,
                TransportLevelPoisonMessage::MESSAGE_TYPE,
                poison.handler(),
            ),
        Services::new(),
        &CancellationToken::new(),
    );

    assert!(wait_until(WAIT, || broker.commits("billing").len() == 1));
    thread.stop();

    let handled = poison.handled();
    assert_eq!(handled.len(), 1);
    assert_eq!(handled[0].message.raw_message, "{ not json");
    assert!(!handled[0].message.error.is_empty());
}

#[test]
fn filtered_messages_are_committed_without_handling() {
    init_tracing();
    let broker = InMemoryBroker::new();
    publish_order(&broker, "m-1", "internal");
    publish_order(&broker, "m-2", "2");
    let spy = MessageHandlerSpy::<OrderPlaced>::new();

    let thread = spawn(
        manual_commit(options(&broker, "billing"))
            .with_message_filter(|message: &IncomingMessage| {
                message.data()["orderId"] != json!("internal")
            })
            .register_message_handler::<OrderPlaced, _>(TOPIC, "order_placed", spy.handler()),
        Services::new(),
        &CancellationToken::new(),
    );

    assert!(wait_until(WAIT, || broker.commits("billing").len() == 2));
    let stats = thread.stop();

    assert_eq!(spy.handled()[0].message_id, "m-2");
    assert_eq!(stats.messages_handled, 2);
}

#[test]
fn read_from_beginning_ignores_committed_offsets() {
    init_tracing();
    let broker = InMemoryBroker::new();
    publish_order(&broker, "m-1", "1");

    let first = MessageHandlerSpy::<OrderPlaced>::new();
    let thread = spawn(
        manual_commit(options(&broker, "billing"))
            .register_message_handler::<OrderPlaced, _>(TOPIC, "order_placed", first.handler()),
        Services::new(),
        &CancellationToken::new(),
    );
    assert!(wait_until(WAIT, || broker.commits("billing").len() == 1));
    thread.stop();

    let replay = MessageHandlerSpy::<OrderPlaced>::new();
    let thread = spawn(
        manual_commit(options(&broker, "billing"))
            .read_from_beginning()
            .register_message_handler::<OrderPlaced, _>(TOPIC, "order_placed", replay.handler()),
        Services::new(),
        &CancellationToken::new(),
    );
    assert!(wait_until(WAIT, || replay.count() == 1));
    thread.stop();

    assert_eq!(first.count(), 1);
    assert_eq!(replay.handled()[0].message_id, "m-1");
}
