//! Error types for the provider layer.
//!
//! Expected outcomes ("provider not installed", "server unsupported",
//! "nothing found") are `None` or empty collections and never show up here.

use thiserror::Error;
use throttle::TaskError;

/// Registration and discovery failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another entry already uses this key.
    #[error("duplicate provider key '{key}' (already registered by {existing})")]
    DuplicateKey { key: String, existing: &'static str },

    /// The entry cannot be registered at all.
    #[error("invalid provider entry '{key}': {reason}")]
    InvalidEntry { key: String, reason: String },

    /// A loader could not produce its providers.
    #[error("provider loader '{loader}' failed: {message}")]
    Load { loader: String, message: String },
}

/// Outcome classes of the HTTP collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("request canceled")]
    Canceled,
}

impl NetworkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetworkError::NotFound { .. })
    }
}

/// Typed failure of a provider or extractor operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },

    /// The provider lacks the capability the caller asked for.
    #[error("{0} is not supported by this provider")]
    Unsupported(&'static str),

    #[error("operation canceled")]
    Canceled,
}

impl ProviderError {
    pub fn parse(what: &'static str, message: impl std::fmt::Display) -> Self {
        ProviderError::Parse {
            what,
            message: message.to_string(),
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(
            self,
            ProviderError::Canceled | ProviderError::Network(NetworkError::Canceled)
        )
    }
}

impl From<TaskError<ProviderError>> for ProviderError {
    fn from(err: TaskError<ProviderError>) -> Self {
        match err {
            TaskError::Failed(inner) => inner,
            TaskError::Canceled | TaskError::Disposed => ProviderError::Canceled,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
