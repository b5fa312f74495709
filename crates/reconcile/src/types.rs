//! Core types for statement reconciliation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The three declarative statement kinds
///
/// They share one reconciliation algorithm and differ only in the name of
/// the statement field and whether result rows are captured into status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Query,
    Execute,
    Exec,
}

impl ResourceKind {
    /// All kinds, in registration order
    pub const ALL: [ResourceKind; 3] = [Self::Query, Self::Execute, Self::Exec];

    /// Lowercase name used in keys, paths and the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Execute => "execute",
            Self::Exec => "exec",
        }
    }

    /// Name of the statement field under `spec.forProvider`
    pub fn statement_field(&self) -> &'static str {
        self.as_str()
    }

    /// Whether result rows are recorded into `status.atProvider.results`
    pub fn captures_results(&self) -> bool {
        matches!(self, Self::Query | Self::Execute)
    }

    /// Informational message recorded after a successful execution
    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Query => "SQL query executed successfully",
            Self::Execute => "SQL statement executed successfully",
            Self::Exec => "SQL exec statement executed successfully",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "Query"),
            Self::Execute => write!(f, "Execute"),
            Self::Exec => write!(f, "Exec"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "query" | "queries" => Ok(Self::Query),
            "execute" | "executes" => Ok(Self::Execute),
            "exec" | "execs" => Ok(Self::Exec),
            other => Err(format!(
                "unknown resource kind '{other}' (expected query, execute or exec)"
            )),
        }
    }
}

/// Identity of one resource instance: its kind plus its name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.name)
    }
}

impl FromStr for ResourceKey {
    type Err = String;

    /// Parse "kind/name", e.g. "query/list-logins"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once('/')
            .ok_or_else(|| format!("expected <kind>/<name>, got '{s}'"))?;
        if name.is_empty() {
            return Err(format!("missing resource name in '{s}'"));
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

/// Result of observing a resource
///
/// For one-shot statements both flags always carry `status.synced`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
}

/// Result of a create call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    /// The statement was handed to the execution client during this call
    pub executed: bool,
    /// The outcome recorded into status was a failure
    pub statement_failed: bool,
}

/// Result of an update call (statements are immutable, so always empty)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalUpdate;

/// What one reconciliation pass did to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassOutcome {
    /// Create ran; the statement was attempted (or the attempt was settled)
    Created { statement_failed: bool },
    /// Update ran (never observed for statements, kept for protocol shape)
    Updated,
    /// Already synced, nothing to do
    UpToDate,
    /// Deletion was requested and handled; the record may be released
    Deleted,
}

/// How the controller protects against double execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptPolicy {
    /// Execute, then persist the outcome. A failed status write can lead to
    /// a second execution on the next pass.
    #[default]
    AtLeastOnce,
    /// Persist an attempt marker before executing. A pass that finds the
    /// marker without an outcome records an error instead of executing.
    AtMostOnce,
}

/// Options for a scheduler pass
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Maximum number of resources of one kind reconciled concurrently
    pub jobs: usize,
    /// Deadline applied to each individual pass
    pub timeout: Option<Duration>,
}

/// Default concurrency ceiling per kind
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_MAX_CONCURRENCY,
            timeout: None,
        }
    }
}

/// Summary of a scheduler pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Statements executed successfully
    pub created: usize,
    /// Statements attempted whose failure was recorded into status
    pub statement_failed: usize,
    pub up_to_date: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Passes that returned an error (connect, references, persistence)
    pub failed: usize,
    /// Resources held back by backoff
    pub skipped: usize,
}

impl ReconcileSummary {
    /// Total number of statements attempted in this pass
    pub fn total_executed(&self) -> usize {
        self.created + self.statement_failed
    }

    /// Check if the pass had no errors
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources considered
    pub fn total(&self) -> usize {
        self.created
            + self.statement_failed
            + self.up_to_date
            + self.updated
            + self.deleted
            + self.failed
            + self.skipped
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ReconcileSummary) {
        self.created += other.created;
        self.statement_failed += other.statement_failed;
        self.up_to_date += other.up_to_date;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// Add a pass outcome to the summary
    pub fn add_outcome(&mut self, outcome: &PassOutcome) {
        match outcome {
            PassOutcome::Created {
                statement_failed: false,
            } => self.created += 1,
            PassOutcome::Created {
                statement_failed: true,
            } => self.statement_failed += 1,
            PassOutcome::Updated => self.updated += 1,
            PassOutcome::UpToDate => self.up_to_date += 1,
            PassOutcome::Deleted => self.deleted += 1,
        }
    }
}
