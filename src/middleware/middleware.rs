use std::marker::PhantomData;

use crate::error::Error;

/// Continuation handed to a middleware. Calling it runs the rest of the
/// pipeline with the next context.
pub type Next<'a, C> = &'a dyn Fn(C) -> Result<(), Error>;

/// One step of a pipeline.
///
/// A middleware receives the current context of type `In` and decides
/// whether to continue by calling `next` with a context of type `Self::Out`.
/// Returning without calling `next` short-circuits the remaining steps.
pub trait Middleware<In>: Send + Sync {
    type Out;

    fn invoke(&self, context: In, next: Next<'_, Self::Out>) -> Result<(), Error>;
}

/// Middleware built from a closure. See [`from_fn`].
pub struct FromFn<F, In, Out> {
    f: F,
    _marker: PhantomData<fn(In) -> Out>,
}

/// Turn a closure into a middleware.
///
/// ```ignore
/// let log = from_fn(|ctx: IncomingMessageContext, next: Next<'_, IncomingMessageContext>| {
///     tracing::info!(message_type = %ctx.message.message_type(), "received");
///     next(ctx)
/// });
/// ```
pub fn from_fn<In, Out, F>(f: F) -> FromFn<F, In, Out>
where
    F: Fn(In, Next<'_, Out>) -> Result<(), Error> + Send + Sync,
{
    FromFn {
        f,
        _marker: PhantomData,
    }
}

impl<F, In, Out> Middleware<In> for FromFn<F, In, Out>
where
    F: Fn(In, Next<'_, Out>) -> Result<(), Error> + Send + Sync,
{
    type Out = Out;

    fn invoke(&self, context: In, next: Next<'_, Out>) -> Result<(), Error> {
        (self.f)(context, next)
    }
}
