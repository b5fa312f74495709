//! Declarative statement resources
//!
//! A resource declares one SQL statement to run once against a target
//! database. The three kinds (`Query`, `Execute`, `Exec`) share the same
//! shape; only the statement field name differs:
//!
//! ```toml
//! kind = "Query"
//! apiVersion = "sql.stmtctl.dev/v1alpha1"
//!
//! [metadata]
//! name = "count-logins"
//!
//! [spec.forProvider]
//! database = "inventory"
//! query = "SELECT COUNT(*) AS n FROM logins"
//!
//! [spec.providerConfigRef]
//! name = "default"
//! ```

use crate::status::Status;
use crate::types::{ResourceKey, ResourceKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// API group and version written on every resource
pub const API_VERSION: &str = "sql.stmtctl.dev/v1alpha1";

/// Name of the ProviderConfig used when a resource names none
pub const DEFAULT_PROVIDER_CONFIG: &str = "default";

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_provider_config_ref() -> Reference {
    Reference::new(DEFAULT_PROVIDER_CONFIG)
}

/// Object metadata shared by every stored object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    /// Bumped by the store on every write; status updates are conditional on it
    #[serde(default)]
    pub resource_version: u64,

    /// Set to ask the controller to release this record
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deletion_requested: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Reference to another object by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Label selector matching objects carrying all listed labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl Selector {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .match_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "{{{}}}", pairs.join(","))
    }
}

/// Where the statement runs: a database name, or a way to find one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_ref: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_selector: Option<Selector>,
}

impl DatabaseTarget {
    pub fn named(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Default::default()
        }
    }
}

/// The kind-specific statement field
pub trait StatementField:
    fmt::Debug + Clone + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: ResourceKind;

    fn new(text: String) -> Self;

    fn text(&self) -> &str;
}

/// `spec.forProvider.query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatement {
    pub query: String,
}

/// `spec.forProvider.execute`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteStatement {
    pub execute: String,
}

/// `spec.forProvider.exec`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStatement {
    pub exec: String,
}

impl StatementField for QueryStatement {
    const KIND: ResourceKind = ResourceKind::Query;

    fn new(text: String) -> Self {
        Self { query: text }
    }

    fn text(&self) -> &str {
        &self.query
    }
}

impl StatementField for ExecuteStatement {
    const KIND: ResourceKind = ResourceKind::Execute;

    fn new(text: String) -> Self {
        Self { execute: text }
    }

    fn text(&self) -> &str {
        &self.execute
    }
}

impl StatementField for ExecStatement {
    const KIND: ResourceKind = ResourceKind::Exec;

    fn new(text: String) -> Self {
        Self { exec: text }
    }

    fn text(&self) -> &str {
        &self.exec
    }
}

/// `spec.forProvider`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters<S> {
    #[serde(flatten)]
    pub target: DatabaseTarget,

    #[serde(flatten)]
    pub statement: S,
}

/// `spec`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec<S> {
    pub for_provider: Parameters<S>,

    #[serde(default = "default_provider_config_ref")]
    pub provider_config_ref: Reference,
}

/// A declarative statement resource of one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Managed<S> {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    pub metadata: ObjectMeta,

    pub spec: ResourceSpec<S>,

    #[serde(default)]
    pub status: Status,
}

pub type Query = Managed<QueryStatement>;
pub type Execute = Managed<ExecuteStatement>;
pub type Exec = Managed<ExecStatement>;

impl<S: StatementField> Managed<S> {
    /// A new, unsynced resource using the default ProviderConfig
    pub fn new(name: impl Into<String>, target: DatabaseTarget, statement: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            metadata: ObjectMeta::named(name),
            spec: ResourceSpec {
                for_provider: Parameters {
                    target,
                    statement: S::new(statement.into()),
                },
                provider_config_ref: default_provider_config_ref(),
            },
            status: Status::default(),
        }
    }

    /// Use a specific ProviderConfig
    pub fn with_provider_config(mut self, name: impl Into<String>) -> Self {
        self.spec.provider_config_ref = Reference::new(name);
        self
    }
}

/// The capability set the controller needs from a resource
///
/// The controller never sees concrete kinds; it type-checks through
/// [`ManagedResource::kind`] and works on the statement, target and status.
pub trait ManagedResource: Send + fmt::Debug {
    fn kind(&self) -> ResourceKind;

    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// The SQL text
    fn statement(&self) -> &str;

    fn target(&self) -> &DatabaseTarget;

    fn target_mut(&mut self) -> &mut DatabaseTarget;

    /// Name of the ProviderConfig holding the credentials reference
    fn provider_config_name(&self) -> &str;

    fn status(&self) -> &Status;

    fn status_mut(&mut self) -> &mut Status;

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn key(&self) -> ResourceKey {
        ResourceKey::new(self.kind(), self.name())
    }

    /// Concrete database name, empty when unset
    fn database_name(&self) -> &str {
        self.target().database.as_deref().unwrap_or("")
    }
}

impl<S: StatementField> ManagedResource for Managed<S> {
    fn kind(&self) -> ResourceKind {
        S::KIND
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn statement(&self) -> &str {
        self.spec.for_provider.statement.text()
    }

    fn target(&self) -> &DatabaseTarget {
        &self.spec.for_provider.target
    }

    fn target_mut(&mut self) -> &mut DatabaseTarget {
        &mut self.spec.for_provider.target
    }

    fn provider_config_name(&self) -> &str {
        &self.spec.provider_config_ref.name
    }

    fn status(&self) -> &Status {
        &self.status
    }

    fn status_mut(&mut self) -> &mut Status {
        &mut self.status
    }
}

/// Any statement resource, tagged by `kind` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AnyResource {
    Query(Query),
    Execute(Execute),
    Exec(Exec),
}

impl AnyResource {
    /// Build a resource of the given kind
    pub fn new(
        kind: ResourceKind,
        name: impl Into<String>,
        target: DatabaseTarget,
        statement: impl Into<String>,
    ) -> Self {
        match kind {
            ResourceKind::Query => Self::Query(Query::new(name, target, statement)),
            ResourceKind::Execute => Self::Execute(Execute::new(name, target, statement)),
            ResourceKind::Exec => Self::Exec(Exec::new(name, target, statement)),
        }
    }

    pub fn as_managed(&self) -> &dyn ManagedResource {
        match self {
            Self::Query(r) => r,
            Self::Execute(r) => r,
            Self::Exec(r) => r,
        }
    }

    pub fn as_managed_mut(&mut self) -> &mut dyn ManagedResource {
        match self {
            Self::Query(r) => r,
            Self::Execute(r) => r,
            Self::Exec(r) => r,
        }
    }
}

impl From<Query> for AnyResource {
    fn from(r: Query) -> Self {
        Self::Query(r)
    }
}

impl From<Execute> for AnyResource {
    fn from(r: Execute) -> Self {
        Self::Execute(r)
    }
}

impl From<Exec> for AnyResource {
    fn from(r: Exec) -> Self {
        Self::Exec(r)
    }
}

impl ManagedResource for AnyResource {
    fn kind(&self) -> ResourceKind {
        self.as_managed().kind()
    }

    fn meta(&self) -> &ObjectMeta {
        self.as_managed().meta()
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        self.as_managed_mut().meta_mut()
    }

    fn statement(&self) -> &str {
        self.as_managed().statement()
    }

    fn target(&self) -> &DatabaseTarget {
        self.as_managed().target()
    }

    fn target_mut(&mut self) -> &mut DatabaseTarget {
        self.as_managed_mut().target_mut()
    }

    fn provider_config_name(&self) -> &str {
        self.as_managed().provider_config_name()
    }

    fn status(&self) -> &Status {
        self.as_managed().status()
    }

    fn status_mut(&mut self) -> &mut Status {
        self.as_managed_mut().status_mut()
    }
}
