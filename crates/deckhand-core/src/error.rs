//! Error types for Deckhand.

use thiserror::Error;

use crate::deferred::Unresolved;

#[derive(Debug, Error)]
pub enum Error {
    #[error("deployment '{deployment}' declares domains but has no container port")]
    MissingContainerPort { deployment: String },

    #[error("deployment '{deployment}' requires exposure but the platform cannot expose services")]
    MissingExposeService { deployment: String },

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("provisioner error: {0}")]
    Provisioner(String),

    #[error(transparent)]
    Unresolved(#[from] Unresolved),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
