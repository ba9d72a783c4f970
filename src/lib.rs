//! Transactional outbox and typed middleware pipelines for consuming and
//! producing broker messages.

pub mod broker;
pub mod cancellation;
pub mod configuration;
pub mod consuming;
mod error;
pub mod hosting;
pub mod message;
pub mod middleware;
pub mod outbox;
pub mod producing;
pub mod serializing;
pub mod services;

pub use cancellation::CancellationToken;
pub use configuration::{
    ConsumerOptions, OutboxOptions, OutboxProducerOptions, ProducerOptions,
};
pub use consuming::{MessageHandler, MessageHandlerContext};
pub use error::{BoxError, Error, ProduceError, RepositoryError};
pub use hosting::{HostStats, Messaging, MessagingHost};
pub use message::{AnyMessage, Metadata};
pub use outbox::{OutboxEntry, OutboxQueue};
pub use producing::Producer;
pub use services::{Scope, Services};
