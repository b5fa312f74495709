//! Error types for statement reconciliation
//!
//! Errors are categorized so the scheduler can decide whether a failed pass
//! is retried on the next poll. Statement execution failures are not part of
//! this taxonomy: they are recorded into status and never surface as errors.

use crate::types::ResourceKind;
use thiserror::Error;

/// The caller's context was cancelled or ran past its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reconciliation cancelled")]
pub struct Cancelled;

/// Failure reported by a store collaborator (configs, secrets, usage, status)
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    /// A conditional write lost against a concurrent writer
    #[error("conflict writing {name}: {message}")]
    Conflict { name: String, message: String },

    /// The call observed a cancelled context
    #[error("operation cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure
    #[error("{0}")]
    Backend(String),
}

impl From<Cancelled> for StoreError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Failure reported by an execution client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The credentials cannot be used to open a session
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The session could not be opened
    #[error("cannot open session: {0}")]
    Open(String),

    /// The database rejected or failed the statement; the text is recorded
    /// verbatim into `status.atProvider.error`
    #[error("{0}")]
    Statement(String),

    /// The statement was interrupted because the context was cancelled
    #[error("statement execution cancelled")]
    Cancelled,
}

impl From<Cancelled> for ClientError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Failures while resolving a resource into an open session
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("cannot track ProviderConfig usage: {0}")]
    TrackingFailed(#[source] StoreError),

    #[error("cannot get ProviderConfig {name}: not found")]
    ConfigNotFound { name: String },

    #[error("cannot get ProviderConfig {name}: {source}")]
    ConfigLookup {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("ProviderConfig {name} does not reference a credentials Secret")]
    MissingSecretRef { name: String },

    #[error("cannot get credentials Secret {namespace}/{name}: not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("cannot get credentials Secret {namespace}/{name}: {source}")]
    SecretLookup {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("cannot open database session: {0}")]
    Session(#[source] ClientError),
}

/// Failures while resolving `databaseRef` / `databaseSelector`
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("referenced Database {name} not found")]
    NotFound { name: String },

    #[error("no Database matches selector {selector}")]
    NoMatch { selector: String },

    #[error("cannot look up Database: {0}")]
    Lookup(#[source] StoreError),
}

/// Categories of reconciliation errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Wiring defect; retrying will not help
    Fatal,
    /// Connection, configuration or reference problem; retried with backoff
    Recoverable,
    /// Status could not be written after an attempt
    Persist,
    /// The pass was cancelled or timed out; the resource is untouched
    Cancelled,
}

impl ErrorCategory {
    /// Whether the next poll should try this resource again
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }

    /// Get a user-friendly description of this error category
    pub fn description(&self) -> &'static str {
        match self {
            Self::Fatal => "Controller wiring defect",
            Self::Recoverable => "Cannot reach provider",
            Self::Persist => "Status not recorded",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Errors surfaced to the scheduler by a reconciliation pass
#[derive(Debug, Error)]
pub enum Error {
    /// The resource handed to a controller is of another kind
    #[error("managed resource is not a {expected} custom resource (got {found})")]
    WrongKind {
        expected: ResourceKind,
        found: ResourceKind,
    },

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("cannot resolve references: {0}")]
    References(#[from] ReferenceError),

    /// The status write after an attempt failed
    #[error("cannot update managed resource status: {0}")]
    StatusPersist(#[source] StoreError),

    #[error("reconciliation cancelled")]
    Cancelled,
}

impl From<Cancelled> for Error {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl Error {
    /// Get the error category for retry logic
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::WrongKind { .. } => ErrorCategory::Fatal,
            Self::Connect(_) | Self::References(_) => ErrorCategory::Recoverable,
            Self::StatusPersist(_) => ErrorCategory::Persist,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Whether this error is worth retrying on the next poll
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Event reason recorded for this error
    pub fn reason(&self) -> &'static str {
        use crate::events::reason;

        match self {
            Self::WrongKind { .. } | Self::Connect(_) => reason::CANNOT_CONNECT,
            Self::References(_) => reason::CANNOT_RESOLVE_REFERENCES,
            Self::StatusPersist(_) => reason::CANNOT_UPDATE_STATUS,
            Self::Cancelled => reason::CANCELLED,
        }
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;
