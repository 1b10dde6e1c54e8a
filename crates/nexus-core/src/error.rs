//! Error types for the deployment core.
//!
//! Every fallible operation in this crate returns [`NexusError`]. The variants
//! follow the four classes callers are expected to translate differently
//! (invalid arguments, unexpected source data, broken contracts and
//! environment failures), plus transparent wrappers for the formats and
//! collaborators the core talks to.

use thiserror::Error;

/// Result alias used throughout `nexus-core`.
pub type Result<T> = std::result::Result<T, NexusError>;

/// Coarse classification of a [`NexusError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed identifier or argument rejected at construction/setter time.
    InvalidArgument,
    /// Malformed source document or serialized data.
    UnexpectedValue,
    /// Contract violation by the caller.
    Logic,
    /// Environment or format failure.
    Runtime,
}

/// Main error type for the deployment core
#[derive(Error, Debug)]
pub enum NexusError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unexpected value: {0}")]
    UnexpectedValue(String),

    #[error("Logic error: {0}")]
    Logic(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// Failure reported by a node strategy implementation.
    #[error(transparent)]
    Strategy(#[from] anyhow::Error),
}

impl NexusError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unexpected_value(msg: impl Into<String>) -> Self {
        Self::UnexpectedValue(msg.into())
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self::Logic(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Classify this error.
    ///
    /// Wrapped parse failures count as unexpected values; I/O, archive and
    /// strategy failures are runtime conditions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::UnexpectedValue(_) | Self::Json(_) | Self::Toml(_) => ErrorKind::UnexpectedValue,
            Self::Logic(_) => ErrorKind::Logic,
            Self::Runtime(_)
            | Self::Io(_)
            | Self::Zip(_)
            | Self::TomlWrite(_)
            | Self::Strategy(_) => ErrorKind::Runtime,
        }
    }

    pub fn is_logic(&self) -> bool {
        self.kind() == ErrorKind::Logic
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }

    pub fn is_unexpected_value(&self) -> bool {
        self.kind() == ErrorKind::UnexpectedValue
    }

    pub fn is_runtime(&self) -> bool {
        self.kind() == ErrorKind::Runtime
    }
}
