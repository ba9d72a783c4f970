//! Broker client configuration and the option builders of consumers,
//! producers and the outbox.
//!
//! Keys are resolved in this order:
//!
//! 1. values set manually on the options (`with_configuration`, `with_group_id`, ...)
//! 2. the configuration source, trying each naming convention in turn
//!
//! ```text
//! key "group.id"  ──► Default          ──► "group.id"
//!                 ──► Environment(app) ──► "APP_GROUP_ID"
//! ```
//!
//! Every lookup is recorded by a [`ConfigurationReporter`]; the report is
//! logged at debug level and included in the error when a required key is
//! missing.

mod builder;
#[allow(clippy::module_inception)]
mod configuration;
mod consumer_options;
pub mod keys;
mod naming;
mod outbox_options;
mod producer_options;
mod reporter;
mod settings;
mod source;

pub use builder::ConfigurationBuilder;
pub use configuration::Configuration;
pub use consumer_options::{ConsumerConfiguration, ConsumerOptions};
pub use keys::{ConfigurationKey, ConfigurationKeys};
pub use naming::{NamingConvention, NamingConventions};
pub use outbox_options::{
    OutboxConfiguration, OutboxOptions, OutboxProducerConfiguration, OutboxProducerOptions,
};
pub use producer_options::{ProducerConfiguration, ProducerOptions};
pub use reporter::ConfigurationReporter;
pub use source::{
    ConfigurationSource, EnvironmentConfigurationSource, MapConfigurationSource,
    NullConfigurationSource,
};
