//! Consuming: from raw broker messages to typed handler calls.
//!
//! ```text
//! ┌──────────┐   ┌─────────────────┐   ┌────────┐   ┌────────────────┐   ┌────────────┐
//! │ Consumer │──►│ Deserialization │──►│ Filter │──►│ MessageHandler │──►│ Invocation │
//! └──────────┘   └─────────────────┘   └────────┘   └────────────────┘   └────────────┘
//!   receive         RawMessage ─►                     type name ─►         handler(msg)
//!   commit          IncomingMessage                   registration
//! ```
//!
//! - [`MessageHandlerRegistry`] binds `(topic, message type name)` to a
//!   [`MessageHandler`]; the subscribed topics come from it.
//! - [`Consumer`] drives one consumer group. [`ConsumerThread`] runs it in the
//!   background, restarting according to the [`ConsumerErrorHandler`].
//! - [`PoisonAwareDeserializer`] turns envelopes that cannot be read into
//!   [`TransportLevelPoisonMessage`]s.

mod broker;
mod consumer;
mod deserializer;
mod error_handler;
mod filter;
mod handler;
mod incoming;
mod middleware;
mod registry;
mod thread;

pub use broker::{BrokerConsumer, BrokerConsumerFactory};
pub use consumer::{Consumer, ConsumerStats};
pub use deserializer::{
    Deserializer, JsonDeserializer, PoisonAwareDeserializer, TransportLevelPoisonMessage,
};
pub use error_handler::{ConsumerErrorHandler, ConsumerFailureStrategy};
pub use filter::{AcceptAll, MessageFilter};
pub use handler::{MessageHandler, MessageHandlerContext};
pub use incoming::IncomingMessage;
pub use middleware::{
    DeserializationMiddleware, IncomingMessageContext, IncomingRawMessageContext,
    InvocationContext, InvocationMiddleware, MessageFilterMiddleware, MessageHandlerMiddleware,
};
pub use registry::{
    IgnoreUnconfiguredMessages, MessageHandlerInvoker, MessageHandlerRegistry,
    MessageRegistration, RequireExplicitHandlers, UnconfiguredMessageHandlingStrategy,
};
pub use thread::ConsumerThread;
