//! Connection settings decoded from raw credentials

use crate::error::{Error, Result};
use reconcile::ConnectionDetails;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Credentials key holding the database location
pub const ENDPOINT_KEY: &str = "endpoint";

/// Optional credentials key holding the busy timeout in milliseconds
pub const BUSY_TIMEOUT_KEY: &str = "busy_timeout_ms";

const MEMORY: &str = ":memory:";

/// Where sessions connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A private in-memory database per session
    Memory,
    /// A database file, or a directory of `<name>.db` files
    Path(PathBuf),
}

/// What a single session opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Memory,
    File(PathBuf),
}

/// Settings for opening sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub endpoint: Endpoint,
    pub busy_timeout: Option<Duration>,
}

impl ConnectionSettings {
    /// Decode settings from a credentials secret
    pub fn from_credentials(credentials: &ConnectionDetails) -> Result<Self> {
        let endpoint = text(credentials, ENDPOINT_KEY)?
            .filter(|s| !s.trim().is_empty())
            .ok_or(Error::MissingKey(ENDPOINT_KEY))?;
        let endpoint = if endpoint == MEMORY {
            Endpoint::Memory
        } else {
            Endpoint::Path(PathBuf::from(endpoint))
        };

        let busy_timeout = text(credentials, BUSY_TIMEOUT_KEY)?
            .map(|ms| {
                ms.trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| Error::InvalidSetting {
                        key: BUSY_TIMEOUT_KEY,
                        message: e.to_string(),
                    })
            })
            .transpose()?;

        Ok(Self {
            endpoint,
            busy_timeout,
        })
    }

    /// Resolve what a session scoped to `database` opens
    ///
    /// An empty name opens the endpoint itself. A name opens
    /// `<endpoint>/<name>.db`, so the endpoint must be a directory. The
    /// in-memory endpoint ignores the name.
    pub fn target(&self, database: &str) -> Result<Target> {
        match &self.endpoint {
            Endpoint::Memory => Ok(Target::Memory),
            Endpoint::Path(path) if database.is_empty() => Ok(Target::File(path.clone())),
            Endpoint::Path(dir) => {
                if dir.exists() && !dir.is_dir() {
                    return Err(Error::NotADirectory(dir.clone()));
                }
                validate_database_name(database)?;
                Ok(Target::File(dir.join(format!("{database}.db"))))
            }
        }
    }
}

fn text(credentials: &ConnectionDetails, key: &'static str) -> Result<Option<String>> {
    credentials
        .get(key)
        .map(|bytes| {
            String::from_utf8(bytes.clone()).map_err(|e| Error::InvalidSetting {
                key,
                message: e.to_string(),
            })
        })
        .transpose()
}

fn validate_database_name(database: &str) -> Result<()> {
    let path = Path::new(database);
    if path.components().count() != 1 || path.is_absolute() || database.starts_with('.') {
        return Err(Error::InvalidSetting {
            key: "database",
            message: format!("'{database}' is not a plain database name"),
        });
    }
    Ok(())
}
