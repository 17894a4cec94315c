//! Errors raised while reading application and platform descriptions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid KDL: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("{field} is not valid JSON: {source}")]
    InvalidJson {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is defined more than once")]
    Duplicate(String),

    #[error("cannot read description: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
