use std::thread::{self, JoinHandle};

use super::{Consumer, ConsumerErrorHandler, ConsumerStats};
use crate::cancellation::CancellationToken;

/// A consumer running on its own thread.
///
/// ```ignore
/// let thread = ConsumerThread::spawn(consumer, ConsumerErrorHandler::stop_application(lifetime));
///
/// // ... messages are handled in the background ...
///
/// let stats = thread.stop();
/// println!("handled {} messages", stats.messages_handled);
/// ```
pub struct ConsumerThread {
    group_id: String,
    cancellation: CancellationToken,
    handle: Option<JoinHandle<ConsumerStats>>,
}

impl ConsumerThread {
    pub fn spawn(consumer: Consumer, error_handler: ConsumerErrorHandler) -> Self {
        Self::spawn_with_token(consumer, error_handler, CancellationToken::new())
    }

    /// Spawn with a caller-owned cancellation token.
    pub fn spawn_with_token(
        consumer: Consumer,
        error_handler: ConsumerErrorHandler,
        cancellation: CancellationToken,
    ) -> Self {
        let group_id = consumer.group_id().to_string();
        let token = cancellation.clone();
        let handle = thread::spawn(move || consumer.run(&token, &error_handler));

        Self {
            group_id,
            cancellation,
            handle: Some(handle),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// `true` once the consume loop has exited on its own or after a stop.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the consumer to stop and wait for the in-flight message to
    /// complete.
    pub fn stop(mut self) -> ConsumerStats {
        self.cancellation.cancel();
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default()
        } else {
            ConsumerStats::default()
        }
    }

    pub fn signal_stop(&self) {
        self.cancellation.cancel();
    }
}

impl Drop for ConsumerThread {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}
