//! Payload descriptors and the serializers that turn them into envelopes.
//!
//! The default serializer writes the JSON envelope:
//!
//! ```text
//! {"messageId": "...", "type": "...", "correlationId": "...", ..., "data": { ... }}
//! ```

mod descriptor;
mod serializer;

pub use descriptor::PayloadDescriptor;
pub use serializer::{DefaultPayloadSerializer, PayloadSerializer, TopicPayloadSerializerRegistry};
