//! Observed state of a statement resource and the projector that records
//! execution outcomes into it.

use crate::context::{ReconcileContext, StatusWriter};
use crate::error::{Error, Result};
use crate::resource::ManagedResource;
use crate::rows::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error recorded when a fallible driver reports an empty message
pub const UNKNOWN_STATEMENT_ERROR: &str = "statement execution failed";

/// Error recorded when an attempt marker is found without an outcome
pub const UNRECORDED_ATTEMPT_ERROR: &str =
    "previous attempt did not record its outcome; statement not re-executed";

/// `status.atProvider`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderObservation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<Row>,
}

/// `status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// The statement has been attempted; never executed again once set
    #[serde(default)]
    pub synced: bool,

    /// Written before execution under the at-most-once policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub at_provider: ProviderObservation,
}

/// The two states of a statement resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsynced,
    Synced,
}

impl Status {
    pub fn state(&self) -> SyncState {
        if self.synced {
            SyncState::Synced
        } else {
            SyncState::Unsynced
        }
    }

    /// A synced status carries exactly one of error or message
    pub fn is_consistent(&self) -> bool {
        if !self.synced {
            return true;
        }
        self.at_provider.error.is_empty() != self.at_provider.message.is_empty()
    }

    /// Whether the last attempt failed
    pub fn failed(&self) -> bool {
        self.synced && !self.at_provider.error.is_empty()
    }
}

/// Outcome of one statement attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { message: String, rows: Vec<Row> },
    Failed { error: String },
}

impl Outcome {
    pub fn succeeded(message: impl Into<String>, rows: Vec<Row>) -> Self {
        Self::Succeeded {
            message: message.into(),
            rows,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::Failed {
            error: if error.trim().is_empty() {
                UNKNOWN_STATEMENT_ERROR.to_string()
            } else {
                error
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Write an outcome into a status buffer
///
/// Rows are only kept for kinds that capture results.
pub fn project(status: &mut Status, outcome: Outcome, captures_results: bool) {
    match outcome {
        Outcome::Succeeded { message, rows } => {
            status.at_provider.error.clear();
            status.at_provider.message = message;
            status.at_provider.results = if captures_results { rows } else { Vec::new() };
        }
        Outcome::Failed { error } => {
            status.at_provider.error = error;
            status.at_provider.message.clear();
            status.at_provider.results.clear();
        }
    }
    status.synced = true;
}

/// Records outcomes into a resource's status and persists them
pub struct StatusProjector<'a> {
    writer: &'a dyn StatusWriter,
}

impl<'a> StatusProjector<'a> {
    pub fn new(writer: &'a dyn StatusWriter) -> Self {
        Self { writer }
    }

    /// Project the outcome and persist the full status
    ///
    /// A failed write surfaces as [`Error::StatusPersist`].
    pub fn record(
        &self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
        outcome: Outcome,
    ) -> Result<()> {
        let captures_results = resource.kind().captures_results();
        let previous = resource.status().clone();
        project(resource.status_mut(), outcome, captures_results);
        self.persist(ctx, resource, previous)
    }

    /// Persist the attempt marker before executing
    pub fn mark_attempt(
        &self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
    ) -> Result<()> {
        let previous = resource.status().clone();
        resource.status_mut().attempt_started_at = Some(Utc::now());
        self.persist(ctx, resource, previous)
    }

    /// Write the buffer through; on failure the buffer goes back to what is stored
    fn persist(
        &self,
        ctx: &ReconcileContext,
        resource: &mut dyn ManagedResource,
        previous: Status,
    ) -> Result<()> {
        if let Err(e) = self.writer.update_status(ctx, resource) {
            *resource.status_mut() = previous;
            return Err(Error::StatusPersist(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStatusWriter, query};

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_project_success_keeps_rows_for_result_kinds() {
        let mut status = Status::default();
        project(
            &mut status,
            Outcome::succeeded("done", vec![row(&[("x", "1")])]),
            true,
        );

        assert!(status.synced);
        assert_eq!(status.at_provider.message, "done");
        assert!(status.at_provider.error.is_empty());
        assert_eq!(status.at_provider.results, vec![row(&[("x", "1")])]);
        assert!(status.is_consistent());
    }

    #[test]
    fn test_project_success_drops_rows_for_exec() {
        let mut status = Status::default();
        project(
            &mut status,
            Outcome::succeeded("done", vec![row(&[("x", "1")])]),
            false,
        );
        assert!(status.at_provider.results.is_empty());
    }

    #[test]
    fn test_project_failure_clears_message() {
        let mut status = Status::default();
        status.at_provider.message = "stale".into();
        project(&mut status, Outcome::failed("boom"), true);

        assert!(status.synced);
        assert!(status.failed());
        assert_eq!(status.at_provider.error, "boom");
        assert!(status.at_provider.message.is_empty());
        assert!(status.is_consistent());
    }

    #[test]
    fn test_empty_error_text_gets_placeholder() {
        assert_eq!(
            Outcome::failed("  "),
            Outcome::Failed {
                error: UNKNOWN_STATEMENT_ERROR.to_string()
            }
        );
    }

    #[test]
    fn test_record_persist_failure_is_wrapped() {
        let writer = MemoryStatusWriter::failing("etcd unavailable");
        let projector = StatusProjector::new(&writer);
        let mut resource = query("q", "SELECT 1");

        let err = projector
            .record(&ReconcileContext::background(), &mut resource, Outcome::failed("x"))
            .unwrap_err();

        assert!(matches!(err, Error::StatusPersist(_)));
        assert_eq!(
            err.to_string(),
            "cannot update managed resource status: etcd unavailable"
        );
        assert_eq!(resource.status, Status::default());
    }

    #[test]
    fn test_mark_attempt_persist_failure_leaves_no_marker() {
        let writer = MemoryStatusWriter::failing("conflict");
        let projector = StatusProjector::new(&writer);
        let mut resource = query("q", "SELECT 1");

        let err = projector
            .mark_attempt(&ReconcileContext::background(), &mut resource)
            .unwrap_err();

        assert!(matches!(err, Error::StatusPersist(_)));
        assert!(resource.status.attempt_started_at.is_none());
        assert!(!resource.status.synced);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let mut status = Status::default();
        project(&mut status, Outcome::failed("no such table: t"), true);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["synced"], true);
        assert_eq!(json["atProvider"]["error"], "no such table: t");
        assert!(json["atProvider"].get("results").is_none());
    }
}
