use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{BrokerConsumer, BrokerConsumerFactory, ConsumerErrorHandler, IncomingRawMessageContext};
use crate::cancellation::CancellationToken;
use crate::configuration::Configuration;
use crate::error::Error;
use crate::message::RawMessage;
use crate::middleware::{EndOfPipeline, MiddlewareBuilder, RootContext};
use crate::services::Services;

/// Counters reported by a consumer when it stops.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    pub messages_handled: usize,
    pub messages_failed: usize,
    pub restarts: usize,
}

/// Receives messages for one consumer group and runs each through the
/// consumer pipeline.
///
/// ```text
/// broker ─► receive ─► scope ─► pipeline ─► commit (unless auto-commit)
///              ▲                                    │
///              └────────────────────────────────────┘
/// ```
///
/// Each message gets its own [`Scope`](crate::services::Scope), dropped as
/// soon as the pipeline returns. When auto-commit is disabled the message is
/// committed only after the pipeline succeeded.
pub struct Consumer {
    group_id: String,
    configuration: Configuration,
    client_factory: Arc<dyn BrokerConsumerFactory>,
    services: Services,
    pipeline: MiddlewareBuilder<IncomingRawMessageContext, EndOfPipeline>,
    topics: Vec<String>,
    read_from_beginning: bool,
    restart_delay: Duration,
}

impl Consumer {
    /// Pause between a failed consume loop and its restart.
    pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(100);

    pub fn new(
        configuration: Configuration,
        client_factory: Arc<dyn BrokerConsumerFactory>,
        services: Services,
        pipeline: MiddlewareBuilder<IncomingRawMessageContext, EndOfPipeline>,
        topics: Vec<String>,
    ) -> Self {
        Self {
            group_id: configuration.group_id().unwrap_or_default().to_string(),
            configuration,
            client_factory,
            services,
            pipeline,
            topics,
            read_from_beginning: false,
            restart_delay: Self::DEFAULT_RESTART_DELAY,
        }
    }

    pub fn with_read_from_beginning(mut self, read_from_beginning: bool) -> Self {
        self.read_from_beginning = read_from_beginning;
        self
    }

    pub fn with_restart_delay(mut self, restart_delay: Duration) -> Self {
        self.restart_delay = restart_delay;
        self
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn is_auto_commit_enabled(&self) -> bool {
        self.configuration.enable_auto_commit()
    }

    /// Consume until cancelled, restarting after failures for as long as
    /// `error_handler` asks for it.
    pub fn run(
        &self,
        cancellation: &CancellationToken,
        error_handler: &ConsumerErrorHandler,
    ) -> ConsumerStats {
        let mut stats = ConsumerStats::default();
        info!(group_id = %self.group_id, topics = ?self.topics, "Consumer started");

        while !cancellation.is_cancelled() {
            match self.consume(cancellation, &mut stats) {
                Ok(()) => break,
                Err(err) => {
                    if cancellation.is_cancelled() || !error_handler.handle_error(&err) {
                        break;
                    }
                    stats.restarts += 1;
                    if cancellation.wait_timeout(self.restart_delay) {
                        break;
                    }
                }
            }
        }

        info!(
            group_id = %self.group_id,
            handled = stats.messages_handled,
            failed = stats.messages_failed,
            restarts = stats.restarts,
            "Consumer stopped"
        );
        stats
    }

    /// Open a broker client, subscribe and consume until cancelled. Returns
    /// the first error unchanged.
    pub fn consume(
        &self,
        cancellation: &CancellationToken,
        stats: &mut ConsumerStats,
    ) -> Result<(), Error> {
        let mut client = self.client_factory.create(&self.configuration)?;
        client.subscribe(&self.topics, self.read_from_beginning)?;
        debug!(group_id = %self.group_id, topics = ?self.topics, "Subscribed");

        while !cancellation.is_cancelled() {
            let Some(message) = client.receive(cancellation)? else {
                continue;
            };

            match self.on_message(client.as_mut(), message) {
                Ok(()) => stats.messages_handled += 1,
                Err(err) => {
                    stats.messages_failed += 1;
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    fn on_message(&self, client: &mut dyn BrokerConsumer, message: RawMessage) -> Result<(), Error> {
        debug!(group_id = %self.group_id, key = ?message.key, "MessageScope:Begin");
        let position = message.position.clone();

        self.run_pipeline(message)?;

        if !self.is_auto_commit_enabled() {
            match &position {
                Some(position) => client.commit(position)?,
                None => warn!(group_id = %self.group_id, "Message has no position to commit"),
            }
        }

        debug!(group_id = %self.group_id, "MessageScope:End");
        Ok(())
    }

    fn run_pipeline(&self, message: RawMessage) -> Result<(), Error> {
        let scope = Arc::new(self.services.create_scope());
        debug!(scope = %scope.id(), "UnitOfWork:Begin");

        let root = RootContext::new(scope.clone());
        self.pipeline
            .build(&scope)
            .invoke(IncomingRawMessageContext::new(message, root))?;

        debug!(scope = %scope.id(), "UnitOfWork:End");
        Ok(())
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("group_id", &self.group_id)
            .field("topics", &self.topics)
            .field("read_from_beginning", &self.read_from_beginning)
            .field("restart_delay", &self.restart_delay)
            .field("pipeline", &self.pipeline.len())
            .finish()
    }
}
