//! Producing: from domain values to serialized broker messages.
//!
//! ```text
//! OutgoingMessageContext ──► PayloadDescription ──► PayloadDescriptorContext
//! PayloadDescriptorContext ──► Serialization ──► OutgoingRawMessageContext
//! OutgoingRawMessageContext ──► Dispatch ──► broker
//! ```
//!
//! The same descriptor and serialization steps feed the outbox; only the
//! last step differs.

mod broker;
mod descriptor_factory;
mod message_id;
mod middleware;
mod producer;
mod producer_registry;
mod registry;

pub use broker::{ActiveProducer, BrokerProducer, BrokerProducerFactory};
pub use descriptor_factory::PayloadDescriptorFactory;
pub use message_id::{MessageIdGenerator, UuidMessageIdGenerator};
pub use middleware::{
    DispatchMiddleware, OutgoingMessageContext, OutgoingRawMessageContext,
    PayloadDescriptionMiddleware, PayloadDescriptorContext, SerializationMiddleware,
};
pub use producer::Producer;
pub use producer_registry::ProducerRegistry;
pub use registry::{OutgoingMessageRegistration, OutgoingMessageRegistry};
