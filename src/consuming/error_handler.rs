use std::fmt;
use std::sync::Arc;

use tracing::{error, warn};

use crate::cancellation::CancellationToken;
use crate::error::Error;

/// What to do after the consume loop failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsumerFailureStrategy {
    /// Stop the application.
    #[default]
    Default,
    /// Reopen the subscription and keep consuming.
    RestartConsumer,
}

type Evaluate = Arc<dyn Fn(&Error) -> ConsumerFailureStrategy + Send + Sync>;

/// Applies the failure evaluation of a consumer.
///
/// ```ignore
/// let attempts = AtomicUsize::new(0);
/// let handler = ConsumerErrorHandler::new(
///     move |_| {
///         if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
///             ConsumerFailureStrategy::RestartConsumer
///         } else {
///             ConsumerFailureStrategy::Default
///         }
///     },
///     lifetime.clone(),
/// );
/// ```
#[derive(Clone)]
pub struct ConsumerErrorHandler {
    evaluate: Evaluate,
    application_lifetime: CancellationToken,
}

impl ConsumerErrorHandler {
    pub fn new<F>(evaluate: F, application_lifetime: CancellationToken) -> Self
    where
        F: Fn(&Error) -> ConsumerFailureStrategy + Send + Sync + 'static,
    {
        Self {
            evaluate: Arc::new(evaluate),
            application_lifetime,
        }
    }

    /// Always [`ConsumerFailureStrategy::Default`].
    pub fn stop_application(application_lifetime: CancellationToken) -> Self {
        Self::new(|_| ConsumerFailureStrategy::Default, application_lifetime)
    }

    pub fn application_lifetime(&self) -> &CancellationToken {
        &self.application_lifetime
    }

    /// Returns `true` when the consumer should restart. Otherwise the
    /// application lifetime is cancelled.
    pub fn handle_error(&self, err: &Error) -> bool {
        match (self.evaluate)(err) {
            ConsumerFailureStrategy::RestartConsumer => {
                warn!(error = %err, "Restarting consumer after failure");
                true
            }
            ConsumerFailureStrategy::Default => {
                error!(error = %err, "Consumer failed, stopping application");
                self.application_lifetime.cancel();
                false
            }
        }
    }
}

impl fmt::Debug for ConsumerErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerErrorHandler")
            .field("application_lifetime", &self.application_lifetime)
            .finish()
    }
}
