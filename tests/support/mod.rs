//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use outbox_relay::{BoxError, MessageHandlerContext};
use serde::{Deserialize, Serialize};

static TRACING: Once = Once::new();

/// Install a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    pub order_id: String,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderShipped {
    pub order_id: String,
}

pub fn order_placed(order_id: &str, amount: u32) -> OrderPlaced {
    OrderPlaced {
        order_id: order_id.to_string(),
        amount,
    }
}

/// What a spy handler saw for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Handled<M> {
    pub message: M,
    pub message_id: String,
    pub correlation_id: String,
    pub causation_id: String,
}

/// Records every message it handles.
#[derive(Clone)]
pub struct MessageHandlerSpy<M> {
    handled: Arc<Mutex<Vec<Handled<M>>>>,
}

impl<M> Default for MessageHandlerSpy<M> {
    fn default() -> Self {
        Self {
            handled: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<M: Clone + Send + 'static> MessageHandlerSpy<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled(&self) -> Vec<Handled<M>> {
        self.handled.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.handled.lock().unwrap().len()
    }

    /// Handler closure recording into this spy.
    pub fn handler(
        &self,
    ) -> impl Fn(M, &MessageHandlerContext) -> Result<(), BoxError> + Send + Sync + 'static {
        let handled = self.handled.clone();
        move |message: M, context: &MessageHandlerContext| -> Result<(), BoxError> {
            handled.lock().unwrap().push(Handled {
                message,
                message_id: context.message_id().to_string(),
                correlation_id: context.correlation_id().to_string(),
                causation_id: context.causation_id().to_string(),
            });
            Ok(())
        }
    }
}
