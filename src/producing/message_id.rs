use uuid::Uuid;

/// Source of ids for outgoing messages that arrive without one.
pub trait MessageIdGenerator: Send + Sync {
    fn next_message_id(&self) -> String;
}

/// Random UUID v4 ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidMessageIdGenerator;

impl MessageIdGenerator for UuidMessageIdGenerator {
    fn next_message_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

impl<F> MessageIdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_message_id(&self) -> String {
        self()
    }
}
