use thiserror::Error;

/// Boxed error returned by user-supplied message handlers and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures reported by outbox storage collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("repository lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("outbox entry {0} not found")]
    EntryNotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// A broker client refused or failed to publish a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} ({code})")]
pub struct ProduceError {
    pub reason: String,
    pub code: String,
}

impl ProduceError {
    pub fn new(reason: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            code: code.into(),
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Error! A Handler has not been registered for messages of type {0}")]
    MissingMessageHandlerRegistration(String),

    #[error("{0}")]
    MessageRegistration(String),

    #[error("{0}")]
    InvalidConfiguration(String),

    #[error("No outgoing message registered for '{0}'")]
    UnregisteredOutgoingMessage(String),

    #[error("A producer with the name \"{0}\" has already been configured. Producer names should be unique.")]
    DuplicateProducer(String),

    #[error("unable to deserialize message: {0}")]
    Deserialization(String),

    #[error("unable to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("error publishing message: {0}")]
    Produce(#[from] ProduceError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("no service registered for {0}")]
    UnresolvedService(&'static str),

    #[error("{0} is not available in the message context")]
    MissingContextItem(&'static str),

    #[error("message handler failed: {0}")]
    Handler(#[source] BoxError),

    #[error("broker failure: {0}")]
    Broker(String),
}

impl Error {
    /// Wrap an arbitrary handler failure, keeping crate errors as they are.
    pub fn handler(err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(inner) => *inner,
            Err(other) => Error::Handler(other),
        }
    }
}
