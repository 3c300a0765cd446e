use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("malformed payload on topic {topic}: {reason}")]
    Malformed { topic: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("no handler registered for event type '{0}'")]
    Routing(String),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("handler timed out after {0:?}")]
    Timeout(Duration),

    /// Registration conflict. Fatal at startup.
    #[error("duplicate handler for event type '{0}'")]
    DuplicateHandler(String),
}

impl DispatchError {
    /// Handler and timeout failures are the only ones worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Handler(_) | DispatchError::Timeout(_))
    }

    pub(crate) fn from_handler(err: anyhow::Error) -> Self {
        DispatchError::Handler(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
