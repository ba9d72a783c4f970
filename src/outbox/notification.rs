use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::cancellation::CancellationToken;
use crate::error::Error;

/// Capture side hint that new entries are waiting.
pub trait OutboxNotifier: Send + Sync {
    fn notify(&self, cancellation: &CancellationToken) -> Result<(), Error>;
}

/// Dispatch side wait for that hint.
pub trait OutboxListener: Send + Sync {
    /// Block until notified, the listener's timeout elapses or `cancellation`
    /// fires. Returns `true` only when notified.
    fn wait(&self, cancellation: &CancellationToken) -> bool;
}

/// Does nothing. The dispatcher falls back to its polling timeout.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullOutboxNotifier;

impl OutboxNotifier for NullOutboxNotifier {
    fn notify(&self, _cancellation: &CancellationToken) -> Result<(), Error> {
        Ok(())
    }
}

const CANCELLATION_CHECK: Duration = Duration::from_millis(50);

/// In-process notifier and listener in one.
///
/// A notification sent while nobody waits is kept until the next `wait`.
///
/// ```ignore
/// let notification = Arc::new(OutboxNotification::new(Duration::from_secs(5)));
/// // capture side
/// queue.enqueue(events)?.notify(&token)?;
/// // dispatch side
/// if notification.wait(&token) { /* woken early */ }
/// ```
#[derive(Debug)]
pub struct OutboxNotification {
    timeout: Duration,
    pending: Mutex<bool>,
    signal: Condvar,
}

impl OutboxNotification {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: Mutex::new(false),
            signal: Condvar::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl OutboxNotifier for OutboxNotification {
    fn notify(&self, _cancellation: &CancellationToken) -> Result<(), Error> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = true;
        self.signal.notify_all();
        trace!("Outbox notified");
        Ok(())
    }
}

impl OutboxListener for OutboxNotification {
    fn wait(&self, cancellation: &CancellationToken) -> bool {
        let deadline = Instant::now() + self.timeout;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            if *pending {
                *pending = false;
                return true;
            }

            let now = Instant::now();
            if now >= deadline || cancellation.is_cancelled() {
                return false;
            }

            let slice = (deadline - now).min(CANCELLATION_CHECK);
            pending = self
                .signal
                .wait_timeout(pending, slice)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
