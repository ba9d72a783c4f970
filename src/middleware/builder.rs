use std::sync::Arc;

use super::middleware::Middleware;
use super::pipeline::{Link, Pipeline};
use crate::error::Error;
use crate::services::Scope;

type Wiring<In, Cur> = Box<dyn FnOnce(Link<Cur>) -> Link<In>>;
type Compose<In, Cur> = Arc<dyn Fn(&Scope) -> Wiring<In, Cur> + Send + Sync>;

/// Accumulates middleware factories for a pipeline that starts with contexts
/// of type `In` and currently ends with contexts of type `Cur`.
///
/// Every `register*` call requires a middleware whose input is `Cur` and
/// returns a builder whose end type is that middleware's output, so adjacent
/// steps can never be wired with mismatched contexts.
///
/// ```ignore
/// let builder = MiddlewareBuilder::<IncomingRawMessageContext>::new()
///     .register(|_| DeserializationMiddleware::new(deserializer.clone()))
///     .register(|_| MessageHandlerMiddleware::new(registry.clone(), None))
///     .register_instance(InvocationMiddleware);
///
/// let pipeline = builder.build(&scope);
/// pipeline.invoke(IncomingRawMessageContext::new(raw, root))?;
/// ```
pub struct MiddlewareBuilder<In, Cur = In> {
    compose: Compose<In, Cur>,
    len: usize,
}

impl<In, Cur> Clone for MiddlewareBuilder<In, Cur> {
    fn clone(&self) -> Self {
        Self {
            compose: self.compose.clone(),
            len: self.len,
        }
    }
}

impl<In: 'static> MiddlewareBuilder<In, In> {
    pub fn new() -> Self {
        Self {
            compose: Arc::new(|_: &Scope| -> Wiring<In, In> { Box::new(|next: Link<In>| next) }),
            len: 0,
        }
    }
}

impl<In: 'static> Default for MiddlewareBuilder<In, In> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In: 'static, Cur: 'static> MiddlewareBuilder<In, Cur> {
    /// Register a middleware created by `factory` each time the pipeline is
    /// built. The factory receives the scope the pipeline is built for.
    pub fn register<M, F>(self, factory: F) -> MiddlewareBuilder<In, M::Out>
    where
        M: Middleware<Cur> + 'static,
        M::Out: 'static,
        F: Fn(&Scope) -> M + Send + Sync + 'static,
    {
        self.push(move |scope| Arc::new(factory(scope)))
    }

    /// Register a single middleware instance shared by every build.
    pub fn register_instance<M>(self, middleware: M) -> MiddlewareBuilder<In, M::Out>
    where
        M: Middleware<Cur> + 'static,
        M::Out: 'static,
    {
        self.register_shared(Arc::new(middleware))
    }

    /// Register an already shared middleware, including trait objects.
    pub fn register_shared<M>(self, middleware: Arc<M>) -> MiddlewareBuilder<In, M::Out>
    where
        M: Middleware<Cur> + ?Sized + 'static,
        M::Out: 'static,
    {
        self.push(move |_| middleware.clone())
    }

    fn push<M, F>(self, materialize: F) -> MiddlewareBuilder<In, M::Out>
    where
        M: Middleware<Cur> + ?Sized + 'static,
        M::Out: 'static,
        F: Fn(&Scope) -> Arc<M> + Send + Sync + 'static,
    {
        let previous = self.compose;

        MiddlewareBuilder {
            compose: Arc::new(move |scope: &Scope| -> Wiring<In, M::Out> {
                // Materialize in registration order.
                let wire_previous = previous(scope);
                let middleware = materialize(scope);

                Box::new(move |next: Link<M::Out>| {
                    let link: Link<Cur> =
                        Arc::new(move |context: Cur| middleware.invoke(context, &*next));
                    wire_previous(link)
                })
            }),
            len: self.len + 1,
        }
    }

    /// Append every middleware of `other` after the ones registered so far.
    pub fn append<Out: 'static>(self, other: MiddlewareBuilder<Cur, Out>) -> MiddlewareBuilder<In, Out> {
        let previous = self.compose;
        let following = other.compose;

        MiddlewareBuilder {
            compose: Arc::new(move |scope: &Scope| -> Wiring<In, Out> {
                let wire_previous = previous(scope);
                let wire_following = following(scope);
                Box::new(move |next: Link<Out>| wire_previous(wire_following(next)))
            }),
            len: self.len + other.len,
        }
    }

    /// Number of registered middleware.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Materialize every middleware for `scope`. The last middleware's
    /// `next` completes immediately.
    pub fn build(&self, scope: &Scope) -> Pipeline<In> {
        self.build_with(scope, |_| Ok(()))
    }

    /// Materialize every middleware for `scope`, appending `action` as the
    /// innermost step.
    pub fn build_with<A>(&self, scope: &Scope, action: A) -> Pipeline<In>
    where
        A: Fn(Cur) -> Result<(), Error> + Send + Sync + 'static,
    {
        let terminal: Link<Cur> = Arc::new(action);
        Pipeline::new((self.compose)(scope)(terminal), self.len)
    }
}
