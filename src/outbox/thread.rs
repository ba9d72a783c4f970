use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use super::{OutboxDispatcher, OutboxListener};
use crate::cancellation::CancellationToken;

/// Statistics from the outbox dispatcher thread.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatcherStats {
    pub messages_published: usize,
    pub messages_failed: usize,
    pub cycles: usize,
}

/// Runs the dispatcher in the background: wait for a notification (or the
/// listener's timeout), dispatch, repeat.
///
/// ```ignore
/// let notification = Arc::new(OutboxNotification::new(Duration::from_millis(500)));
/// let dispatcher = OutboxDispatcherThread::spawn(notification.clone(), dispatcher);
///
/// // ... enqueue and notify ...
///
/// let stats = dispatcher.stop();
/// println!("Published {} entries", stats.messages_published);
/// ```
pub struct OutboxDispatcherThread {
    cancellation: CancellationToken,
    handle: Option<JoinHandle<DispatcherStats>>,
}

impl OutboxDispatcherThread {
    pub fn spawn(listener: Arc<dyn OutboxListener>, dispatcher: OutboxDispatcher) -> Self {
        Self::spawn_with_token(listener, dispatcher, CancellationToken::new())
    }

    pub fn spawn_with_token(
        listener: Arc<dyn OutboxListener>,
        dispatcher: OutboxDispatcher,
        cancellation: CancellationToken,
    ) -> Self {
        let token = cancellation.clone();

        let handle = thread::spawn(move || {
            let mut stats = DispatcherStats::default();

            while !token.is_cancelled() {
                let notified = listener.wait(&token);
                if token.is_cancelled() {
                    break;
                }

                stats.cycles += 1;
                match dispatcher.dispatch(&token) {
                    Ok(result) => {
                        stats.messages_published += result.published;
                        stats.messages_failed += result.failed;
                        if result.published > 0 || result.failed > 0 {
                            debug!(
                                notified,
                                published = result.published,
                                failed = result.failed,
                                "Outbox dispatch cycle"
                            );
                        }
                    }
                    Err(err) => error!(error = %err, "Outbox dispatch failed"),
                }
            }

            stats
        });

        Self {
            cancellation,
            handle: Some(handle),
        }
    }

    /// Signal the dispatcher to stop and wait for the current cycle to end.
    pub fn stop(mut self) -> DispatcherStats {
        self.cancellation.cancel();
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default()
        } else {
            DispatcherStats::default()
        }
    }

    pub fn signal_stop(&self) {
        self.cancellation.cancel();
    }
}

impl Drop for OutboxDispatcherThread {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}
