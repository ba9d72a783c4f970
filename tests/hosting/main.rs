//! Full messaging host: outbox capture, dispatch, consume and produce.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use outbox_relay::broker::InMemoryBroker;
use outbox_relay::outbox::{InMemoryOutboxRepository, OutboxNotification};
use outbox_relay::producing::ProducerRegistry;
use outbox_relay::{
    BoxError, CancellationToken, ConsumerOptions, MessageHandlerContext, Messaging,
    OutboxOptions, OutboxProducerOptions, Producer, ProducerOptions, Services,
};
use serde_json::Value;

use support::{init_tracing, order_placed, wait_until, MessageHandlerSpy, OrderPlaced, OrderShipped};

const WAIT: Duration = Duration::from_secs(5);

/// Ships every placed order through the default producer.
fn ship(order: OrderPlaced, context: &MessageHandlerContext) -> Result<(), BoxError> {
    let producers = context.scope().resolve::<ProducerRegistry>()?;
    let producer = producers
        .get(Producer::DEFAULT_NAME, context.scope().services())?
        .ok_or("no default producer")?;
    producer.produce_in_context(
        OrderShipped {
            order_id: order.order_id,
        },
        context,
    )?;
    Ok(())
}

#[test]
fn captured_events_flow_through_to_consumers() {
    init_tracing();
    let broker = InMemoryBroker::new();
    let repository = InMemoryOutboxRepository::new();
    let notification = Arc::new(OutboxNotification::new(Duration::from_secs(30)));
    let shipped = MessageHandlerSpy::<OrderShipped>::new();

    let host = Messaging::new(Services::new())
        .add_outbox(
            OutboxOptions::new()
                .register::<OrderPlaced, _>("orders", "order_placed", |e| e.order_id.clone())
                .with_notifier(notification.clone()),
        )
        .add_outbox_producer(
            OutboxProducerOptions::new()
                .with_bootstrap_servers("localhost")
                .with_unit_of_work_factory(Arc::new(repository.clone()))
                .with_listener(notification)
                .with_broker_producer_factory(broker.producer_factory()),
        )
        .unwrap()
        .add_producer(
            ProducerOptions::new()
                .with_bootstrap_servers("localhost")
                .with_broker_producer_factory(broker.producer_factory())
                .register::<OrderShipped, _>("shipments", "order_shipped", |e| e.order_id.clone()),
        )
        .unwrap()
        .add_consumer(
            ConsumerOptions::new()
                .with_group_id("shipping")
                .with_bootstrap_servers("localhost")
                .with_broker_consumer_factory(broker.consumer_factory())
                .register_message_handler::<OrderPlaced, _>("orders", "order_placed", ship),
        )
        .unwrap()
        .add_consumer(
            ConsumerOptions::new()
                .with_group_id("notifications")
                .with_bootstrap_servers("localhost")
                .with_broker_consumer_factory(broker.consumer_factory())
                .register_message_handler::<OrderShipped, _>(
                    "shipments",
                    "order_shipped",
                    shipped.handler(),
                ),
        )
        .unwrap()
        .start()
        .unwrap();

    let tx = repository.begin_transaction();
    let notifier = host
        .outbox_queue(Arc::new(tx.clone()))
        .unwrap()
        .enqueue_one(order_placed("7", 70))
        .unwrap();
    tx.commit().unwrap();
    notifier.notify(&CancellationToken::new()).unwrap();

    assert!(wait_until(WAIT, || shipped.count() == 1));
    let stats = host.stop();

    let placed: Value = serde_json::from_str(&broker.messages("orders")[0].data).unwrap();
    let handled = &shipped.handled()[0];
    assert_eq!(handled.message.order_id, "7");
    assert_eq!(handled.correlation_id, placed["messageId"].as_str().unwrap());
    assert_eq!(handled.causation_id, placed["messageId"].as_str().unwrap());

    assert_eq!(stats.dispatcher.map(|d| d.messages_published), Some(1));
    let groups: Vec<_> = stats.consumers.iter().map(|(g, _)| g.as_str()).collect();
    assert_eq!(groups, vec!["shipping", "notifications"]);
    assert!(stats.consumers.iter().all(|(_, s)| s.messages_handled == 1));
    assert!(repository.pending().unwrap().is_empty());
}

#[test]
fn a_failing_consumer_stops_the_host() {
    init_tracing();
    let broker = InMemoryBroker::new();
    broker.publish("orders", None, "{ not json");
    let healthy = MessageHandlerSpy::<OrderShipped>::new();

    let host = Messaging::new(Services::new())
        .add_consumer(
            ConsumerOptions::new()
                .with_group_id("broken")
                .with_bootstrap_servers("localhost")
                .with_broker_consumer_factory(broker.consumer_factory())
                .register_message_handler::<OrderPlaced, _>(
                    "orders",
                    "order_placed",
                    MessageHandlerSpy::<OrderPlaced>::new().handler(),
                ),
        )
        .unwrap()
        .add_consumer(
            ConsumerOptions::new()
                .with_group_id("healthy")
                .with_bootstrap_servers("localhost")
                .with_broker_consumer_factory(broker.consumer_factory())
                .register_message_handler::<OrderShipped, _>(
                    "shipments",
                    "order_shipped",
                    healthy.handler(),
                ),
        )
        .unwrap()
        .start()
        .unwrap();

    assert!(host.wait_for_shutdown(WAIT));
    assert!(host.is_stopping());

    let stats = host.stop();
    assert_eq!(stats.consumers[0].1.messages_failed, 1);
    assert!(stats.dispatcher.is_none());
}
