use super::IncomingMessage;

/// Decides whether a deserialized message reaches its handler.
///
/// Rejected messages are skipped, which still counts as successful handling.
pub trait MessageFilter: Send + Sync {
    fn can_accept(&self, message: &IncomingMessage) -> bool;
}

/// Accepts every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl MessageFilter for AcceptAll {
    fn can_accept(&self, _message: &IncomingMessage) -> bool {
        true
    }
}

impl<F> MessageFilter for F
where
    F: Fn(&IncomingMessage) -> bool + Send + Sync,
{
    fn can_accept(&self, message: &IncomingMessage) -> bool {
        self(message)
    }
}
