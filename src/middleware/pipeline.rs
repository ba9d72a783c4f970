use std::sync::Arc;

use crate::error::Error;

/// A link in a composed pipeline: the remaining chain, starting at some
/// stage, as a single callable.
pub(crate) type Link<C> = Arc<dyn Fn(C) -> Result<(), Error> + Send + Sync>;

/// A materialized, ready-to-run chain of middleware accepting contexts of
/// type `C`.
///
/// Built by [`MiddlewareBuilder::build`](super::MiddlewareBuilder::build).
/// A pipeline without middleware completes immediately.
pub struct Pipeline<C> {
    entry: Link<C>,
    len: usize,
}

impl<C> Clone for Pipeline<C> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            len: self.len,
        }
    }
}

impl<C: 'static> Pipeline<C> {
    pub(crate) fn new(entry: Link<C>, len: usize) -> Self {
        Self { entry, len }
    }

    /// A pipeline with no middleware.
    pub fn empty() -> Self {
        Self::new(Arc::new(|_| Ok(())), 0)
    }

    /// Run the pipeline. Errors from any middleware propagate unchanged.
    pub fn invoke(&self, context: C) -> Result<(), Error> {
        (self.entry)(context)
    }

    /// Number of middleware in the chain.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<C> std::fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("len", &self.len).finish()
    }
}
