use thiserror::Error;

/// Failures surfaced by the channel registry to its caller.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("nick is already taken")]
    NickTaken,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("channel already exists: {0}")]
    ChannelExists(String),

    #[error("invalid secret")]
    InvalidChannelSecret,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),
}

/// Failures reported by a [`crate::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => ChatError::ChannelNotFound(name),
            StoreError::Unavailable(e) => ChatError::StoreUnavailable(e),
        }
    }
}
