//! Producer integration tests.

#[path = "../support/mod.rs"]
mod support;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use outbox_relay::broker::InMemoryBroker;
use outbox_relay::configuration::ProducerConfiguration;
use outbox_relay::consuming::IncomingRawMessageContext;
use outbox_relay::message::RawMessage;
use outbox_relay::middleware::RootContext;
use outbox_relay::producing::ProducerRegistry;
use outbox_relay::{
    ConsumerOptions, Error, MessageHandlerContext, Metadata, ProduceError, Producer,
    ProducerOptions, Services,
};
use serde_json::Value;

use support::{init_tracing, order_placed, MessageHandlerSpy, OrderPlaced, OrderShipped};

fn configuration(broker: &InMemoryBroker) -> ProducerConfiguration {
    ProducerOptions::new()
        .with_bootstrap_servers("localhost")
        .with_broker_producer_factory(broker.producer_factory())
        .register::<OrderPlaced, _>("orders", "order_placed", |e| e.order_id.clone())
        .register::<OrderShipped, _>("shipments", "order_shipped", |e| e.order_id.clone())
        .build()
        .unwrap()
}

fn producer(broker: &InMemoryBroker) -> Producer {
    let mut registry = ProducerRegistry::new();
    registry
        .configure(Producer::DEFAULT_NAME, configuration(broker))
        .unwrap();
    registry
        .get(Producer::DEFAULT_NAME, &Services::new())
        .unwrap()
        .unwrap()
}

fn last_envelope(broker: &InMemoryBroker, topic: &str) -> Value {
    let messages = broker.messages(topic);
    serde_json::from_str(&messages.last().unwrap().data).unwrap()
}

#[test]
fn publishes_envelope_with_key_and_ids() {
    init_tracing();
    let broker = InMemoryBroker::new();

    producer(&broker).produce(order_placed("42", 7)).unwrap();

    let stored = &broker.messages("orders")[0];
    assert_eq!(stored.key.as_deref(), Some("42"));

    let envelope = last_envelope(&broker, "orders");
    let message_id = envelope["messageId"].as_str().unwrap().to_string();
    assert_eq!(envelope["type"], "order_placed");
    assert_eq!(envelope["correlationId"], Value::String(message_id.clone()));
    assert_eq!(envelope["causationId"], Value::String(message_id));
    assert_eq!(envelope["data"]["amount"], 7);
    assert_eq!(
        envelope.as_object().unwrap().keys().next().map(String::as_str),
        Some("messageId")
    );
}

#[test]
fn string_headers_are_published() {
    init_tracing();
    let broker = InMemoryBroker::new();
    let headers = HashMap::from([
        ("messageId".to_string(), "fixed-id".to_string()),
        ("tenant".to_string(), "acme".to_string()),
    ]);

    producer(&broker)
        .produce_with_headers(order_placed("1", 1), headers)
        .unwrap();

    let envelope = last_envelope(&broker, "orders");
    assert_eq!(envelope["messageId"], "fixed-id");
    assert_eq!(envelope["tenant"], "acme");
}

#[test]
fn messages_produced_while_handling_follow_the_causal_chain() {
    init_tracing();
    let broker = InMemoryBroker::new();
    let handled = Services::new().create_scope();
    let context = MessageHandlerContext::new(
        Metadata::new()
            .with("messageId", "m-1")
            .with("correlationId", "c-1"),
        Arc::new(handled),
    );

    producer(&broker)
        .produce_in_context(OrderShipped { order_id: "1".into() }, &context)
        .unwrap();

    let envelope = last_envelope(&broker, "shipments");
    assert_eq!(envelope["correlationId"], "c-1");
    assert_eq!(envelope["causationId"], "m-1");
    assert_ne!(envelope["messageId"], "m-1");
}

#[test]
fn broker_failures_are_returned() {
    init_tracing();
    let broker = InMemoryBroker::new();
    broker.fail_next_produce(ProduceError::new("queue full", "Local_QueueFull"));

    let result = producer(&broker).produce(order_placed("1", 1));

    let Err(Error::Produce(error)) = result else {
        panic!("expected a produce error");
    };
    assert_eq!(error.code, "Local_QueueFull");
    assert!(broker.messages("orders").is_empty());
}

#[test]
fn unregistered_messages_are_rejected() {
    init_tracing();
    let broker = InMemoryBroker::new();

    let result = producer(&broker).produce(String::from("not registered"));

    assert!(matches!(result, Err(Error::UnregisteredOutgoingMessage(_))));
}

#[test]
fn custom_message_ids_are_used() {
    init_tracing();
    let broker = InMemoryBroker::new();
    let next = Arc::new(AtomicUsize::new(0));
    let ids = next.clone();
    let configuration = ProducerOptions::new()
        .with_bootstrap_servers("localhost")
        .with_broker_producer_factory(broker.producer_factory())
        .with_message_id_generator(move || format!("id-{}", ids.fetch_add(1, Ordering::SeqCst)))
        .register::<OrderPlaced, _>("orders", "order_placed", |e| e.order_id.clone())
        .build()
        .unwrap();
    let mut registry = ProducerRegistry::new();
    registry.configure("orders", configuration).unwrap();
    let producer = registry.get("orders", &Services::new()).unwrap().unwrap();

    producer.produce(order_placed("1", 1)).unwrap();
    producer.produce(order_placed("2", 1)).unwrap();

    let ids: Vec<Value> = broker
        .messages("orders")
        .iter()
        .map(|m| serde_json::from_str::<Value>(&m.data).unwrap()["messageId"].clone())
        .collect();
    assert_eq!(ids, vec!["id-0", "id-1"]);
}

#[test]
fn broker_clients_are_created_lazily_and_shared_per_name() {
    init_tracing();
    let broker = InMemoryBroker::new();
    let mut registry = ProducerRegistry::new();
    registry.configure("a", configuration(&broker)).unwrap();
    registry.configure_for::<Services>(configuration(&broker)).unwrap();

    assert_eq!(broker.producers_created(), 0);

    let services = Services::new();
    registry.get("a", &services).unwrap().unwrap();
    registry.get("a", &services).unwrap().unwrap();
    assert_eq!(broker.producers_created(), 1);

    registry.get_for::<Services>(&services).unwrap().unwrap();
    assert_eq!(broker.producers_created(), 2);
    assert!(registry.get("missing", &services).unwrap().is_none());
}

#[test]
fn duplicate_producer_names_are_rejected() {
    let broker = InMemoryBroker::new();
    let mut registry = ProducerRegistry::new();
    registry.configure("a", configuration(&broker)).unwrap();

    let err = registry.configure("a", configuration(&broker)).unwrap_err();

    assert_eq!(
        err.to_string(),
        "A producer with the name \"a\" has already been configured. Producer names should be unique."
    );
}

#[test]
fn produced_envelopes_are_readable_by_consumers() {
    init_tracing();
    let broker = InMemoryBroker::new();
    producer(&broker).produce(order_placed("9", 3)).unwrap();

    let spy = MessageHandlerSpy::<OrderPlaced>::new();
    let consumer = ConsumerOptions::new()
        .with_group_id("round-trip")
        .with_bootstrap_servers("localhost")
        .with_broker_consumer_factory(broker.consumer_factory())
        .register_message_handler::<OrderPlaced, _>("orders", "order_placed", spy.handler())
        .build()
        .unwrap();

    let stored = &broker.messages("orders")[0];
    let scope = Arc::new(Services::new().create_scope());
    consumer
        .pipeline()
        .build(&scope)
        .invoke(IncomingRawMessageContext::new(
            RawMessage::new(stored.key.clone(), stored.data.clone()),
            RootContext::new(scope.clone()),
        ))
        .unwrap();

    let handled = spy.handled();
    assert_eq!(handled[0].message, order_placed("9", 3));
    assert_eq!(handled[0].correlation_id, handled[0].message_id);
}
