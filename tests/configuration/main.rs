//! Resolving client configuration through the option builders.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;

use outbox_relay::broker::InMemoryBroker;
use outbox_relay::configuration::{
    EnvironmentConfigurationSource, MapConfigurationSource, NamingConvention,
};
use outbox_relay::{ConsumerOptions, Error, MessageHandlerContext, BoxError, ProducerOptions};

use support::{init_tracing, OrderPlaced};

fn consumer(broker: &InMemoryBroker) -> ConsumerOptions {
    ConsumerOptions::new()
        .with_broker_consumer_factory(broker.consumer_factory())
        .register_message_handler::<OrderPlaced, _>(
            "orders",
            "order_placed",
            |_: OrderPlaced, _: &MessageHandlerContext| -> Result<(), BoxError> { Ok(()) },
        )
}

#[test]
fn environment_variables_are_found_under_each_prefix() {
    init_tracing();
    std::env::set_var("RELAY_CFG_TEST_BOOTSTRAP_SERVERS", "env-broker:9092");
    std::env::set_var("RELAY_CFG_FALLBACK_GROUP_ID", "env-group");

    let configuration = consumer(&InMemoryBroker::new())
        .with_configuration_source(Arc::new(EnvironmentConfigurationSource))
        .with_environment_style(Some("relay_cfg_test"), &["relay_cfg_fallback"])
        .build()
        .unwrap();

    assert_eq!(
        configuration.configuration().bootstrap_servers(),
        Some("env-broker:9092")
    );
    assert_eq!(configuration.group_id(), "env-group");
}

#[test]
fn config_crate_sources_are_supported() {
    init_tracing();
    let config = config::Config::builder()
        .set_override("bootstrap.servers", "cfg-broker:9092")
        .unwrap()
        .set_override("group.id", "cfg-group")
        .unwrap()
        .build()
        .unwrap();

    let configuration = consumer(&InMemoryBroker::new())
        .with_configuration_source(Arc::new(config))
        .build()
        .unwrap();

    assert_eq!(configuration.group_id(), "cfg-group");
    assert_eq!(
        configuration.configuration().bootstrap_servers(),
        Some("cfg-broker:9092")
    );
}

#[test]
fn custom_naming_conventions_are_tried_in_order() {
    init_tracing();
    let source = MapConfigurationSource::new()
        .with("kafka:bootstrap.servers", "custom")
        .with("BOOTSTRAP_SERVERS", "environment");

    let configuration = ProducerOptions::new()
        .with_configuration_source(Arc::new(source))
        .with_naming_convention(NamingConvention::custom(|key| format!("kafka:{}", key)))
        .with_naming_convention(NamingConvention::environment_style())
        .with_broker_producer_factory(InMemoryBroker::new().producer_factory())
        .build()
        .unwrap();

    assert_eq!(configuration.configuration().bootstrap_servers(), Some("custom"));
}

#[test]
fn manual_values_override_the_source() {
    init_tracing();
    let source = MapConfigurationSource::new()
        .with("bootstrap.servers", "from-source")
        .with("group.id", "from-source");

    let configuration = consumer(&InMemoryBroker::new())
        .with_configuration_source(Arc::new(source))
        .with_group_id("manual")
        .with_configuration("enable.auto.commit", "false")
        .build()
        .unwrap();

    assert_eq!(configuration.group_id(), "manual");
    assert_eq!(
        configuration.configuration().bootstrap_servers(),
        Some("from-source")
    );
    assert!(!configuration.configuration().enable_auto_commit());
}

#[test]
fn missing_keys_are_reported() {
    init_tracing();
    let err = consumer(&InMemoryBroker::new())
        .with_environment_style(Some("app"), &[])
        .build()
        .unwrap_err();

    let Error::InvalidConfiguration(report) = err else {
        panic!("expected an invalid configuration");
    };
    assert!(report.starts_with("Invalid configuration:\n"));
    assert!(report.contains("APP_GROUP_ID"));
    assert!(report.contains("APP_BOOTSTRAP_SERVERS"));
}
