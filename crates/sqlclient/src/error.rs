//! Error types for the sqlclient crate

use reconcile::ClientError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while opening or using a session
#[derive(Error, Debug)]
pub enum Error {
    /// The credentials carry no `endpoint` key
    #[error("credentials have no '{0}' key")]
    MissingKey(&'static str),

    /// A credentials value could not be interpreted
    #[error("invalid '{key}': {message}")]
    InvalidSetting { key: &'static str, message: String },

    /// The endpoint must be a directory when a database name is given
    #[error("endpoint {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// The statement text holds no SQL, only whitespace or comments
    #[error("statement contains no SQL")]
    EmptyStatement,

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for ClientError {
    fn from(err: Error) -> Self {
        match err {
            Error::MissingKey(_) | Error::InvalidSetting { .. } => {
                Self::InvalidCredentials(err.to_string())
            }
            Error::EmptyStatement => Self::Statement(err.to_string()),
            Error::NotADirectory(_) | Error::Database(_) | Error::Io(_) => {
                Self::Open(err.to_string())
            }
        }
    }
}

/// Result type for sqlclient operations
pub type Result<T> = std::result::Result<T, Error>;
