//! Type-changing middleware pipelines.
//!
//! Every inbound and outbound message flow is a chain of middleware. Each
//! step receives one context type and hands the next step a (possibly
//! different) context type through its `next` continuation:
//!
//! ```text
//!  IncomingRawMessageContext ──► Deserialization ──► IncomingMessageContext
//!  IncomingMessageContext    ──► MessageHandler  ──► InvocationContext
//!  InvocationContext         ──► Invocation      ──► EndOfPipeline
//! ```
//!
//! `MiddlewareBuilder<In, Cur>` tracks the first and the current last context
//! type in its generic parameters, so a step whose input does not match the
//! previous step's output is a compile error. `build` materializes the
//! middleware for one resolution scope and composes them into a `Pipeline`.
//!
//! All contexts share a `RootContext`: a type-keyed item bag plus the
//! resolution scope, seeded once per message.

mod builder;
mod context;
#[allow(clippy::module_inception)]
mod middleware;
mod pipeline;

pub use builder::MiddlewareBuilder;
pub use context::{EndOfPipeline, MiddlewareContext, RootContext};
pub use middleware::{from_fn, FromFn, Middleware, Next};
pub use pipeline::Pipeline;
