//! Object documents accepted by `stmtctl apply`
//!
//! Each TOML file holds one object, dispatched on its `kind` field:
//! `Query`, `Execute`, `Exec`, `ProviderConfig`, `Secret` or `Database`.

use anyhow::{Context, Result, bail};
use reconcile::{AnyResource, ConnectionDetails, Database, ManagedResource, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// A credentials secret; values are stored as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: SecretMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Secret {
    pub fn connection_details(&self) -> ConnectionDetails {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), v.as_bytes().to_vec()))
            .collect()
    }
}

/// Any object that can be applied
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Resource(AnyResource),
    ProviderConfig(ProviderConfig),
    Secret(Secret),
    Database(Database),
}

impl Object {
    /// Parse one TOML document
    pub fn parse(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content).context("Invalid TOML")?;
        let kind = table
            .get("kind")
            .and_then(toml::Value::as_str)
            .context("Object has no 'kind'")?;

        let object = match kind {
            "Query" | "Execute" | "Exec" => Self::Resource(
                toml::from_str(content).with_context(|| format!("Invalid {kind}"))?,
            ),
            "ProviderConfig" => Self::ProviderConfig(
                toml::from_str(content).context("Invalid ProviderConfig")?,
            ),
            "Secret" => Self::Secret(toml::from_str(content).context("Invalid Secret")?),
            "Database" => Self::Database(toml::from_str(content).context("Invalid Database")?),
            other => bail!("Unsupported kind '{other}'"),
        };
        Ok(object)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(r) => write!(f, "{}", r.key()),
            Self::ProviderConfig(pc) => write!(f, "providerconfig/{}", pc.name()),
            Self::Secret(s) => write!(f, "secret/{}/{}", s.metadata.namespace, s.metadata.name),
            Self::Database(db) => write!(f, "database/{}", db.metadata.name),
        }
    }
}
