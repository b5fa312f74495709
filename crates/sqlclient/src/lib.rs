//! # Sqlclient
//!
//! SQLite-backed execution client for one-shot statement resources.
//!
//! Sessions are opened from raw credentials (an `endpoint` key naming a
//! database file, a directory of databases, or `:memory:`) and scoped to a
//! database name. Each `execute` runs one statement and returns its rows
//! with every value rendered as a string.
//!
//! ## Example
//!
//! ```no_run
//! use reconcile::{ClientFactory, ConnectionDetails, ReconcileContext};
//! use sqlclient::SqliteClientFactory;
//!
//! let mut credentials = ConnectionDetails::new();
//! credentials.insert("endpoint".into(), b"/var/lib/stmtctl/dbs".to_vec());
//!
//! let mut session = SqliteClientFactory.new_client(&credentials, "inventory")?;
//! let result = session.execute(&ReconcileContext::background(), "SELECT 1 AS x")?;
//! assert_eq!(result.rows[0].get("x"), Some("1"));
//! # Ok::<(), reconcile::ClientError>(())
//! ```

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{BUSY_TIMEOUT_KEY, ConnectionSettings, ENDPOINT_KEY, Endpoint, Target};

use reconcile::{
    ClientError, ClientFactory, ConnectionDetails, ExecutionClient, ReconcileContext, ResultSet,
    Row,
};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode};

/// VM instructions between cancellation checks
const PROGRESS_OPS: i32 = 1000;

/// An open SQLite session
pub struct SqliteClient {
    conn: Connection,
}

impl SqliteClient {
    /// Open a session for `database` using decoded settings
    pub fn open(settings: &ConnectionSettings, database: &str) -> Result<Self> {
        let conn = match settings.target(database)? {
            Target::Memory => Connection::open_in_memory()?,
            Target::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                log::debug!("opening {}", path.display());
                Connection::open(&path)?
            }
        };

        if let Some(timeout) = settings.busy_timeout {
            conn.busy_timeout(timeout)?;
        }

        Ok(Self { conn })
    }

    /// Borrow the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn run(&self, statement: &str) -> Result<ResultSet> {
        let mut stmt = self.conn.prepare(statement)?;
        // SQLite prepares comment-only text to a null statement
        if stmt.expanded_sql().is_none() {
            return Err(Error::EmptyStatement);
        }
        if stmt.column_count() == 0 {
            stmt.execute([])?;
            return Ok(ResultSet::empty());
        }

        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| (*name).to_string())
            .collect();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut out = Row::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                out.insert(column.as_str(), render(row.get_ref(idx)?));
            }
            rows.push(out);
        }

        Ok(ResultSet::new(columns, rows))
    }
}

impl ExecutionClient for SqliteClient {
    fn execute(
        &mut self,
        ctx: &ReconcileContext,
        statement: &str,
    ) -> std::result::Result<ResultSet, ClientError> {
        ctx.check()?;

        let watch = ctx.clone();
        self.conn
            .progress_handler(PROGRESS_OPS, Some(move || watch.is_cancelled()));
        let result = self.run(statement);
        self.conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|e| match e {
            Error::Database(e) if e.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) => {
                ClientError::Cancelled
            }
            Error::Database(e) => ClientError::Statement(statement_error(&e)),
            other => other.into(),
        })
    }
}

/// Opens [`SqliteClient`] sessions from credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteClientFactory;

impl ClientFactory for SqliteClientFactory {
    fn new_client(
        &self,
        credentials: &ConnectionDetails,
        database: &str,
    ) -> std::result::Result<Box<dyn ExecutionClient>, ClientError> {
        let settings = ConnectionSettings::from_credentials(credentials)?;
        let client = SqliteClient::open(&settings, database)?;
        Ok(Box::new(client))
    }
}

/// Render a value the way it is recorded into status
fn render(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// The database's own message, without the driver's wrapping
fn statement_error(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.clone(),
        other => other.to_string(),
    }
}
