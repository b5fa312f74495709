//! Provider-side objects the controller reads but never writes:
//! ProviderConfigs, credential secrets, Databases and usage records.

use crate::resource::{ManagedResource, ObjectMeta};
use crate::types::ResourceKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw connection credentials: secret keys to opaque byte values
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Where a ProviderConfig takes its credentials from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialsSource {
    #[default]
    ConnectionSecret,
}

/// Namespaced reference to a credentials secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl SecretReference {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    #[serde(default)]
    pub source: CredentialsSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_secret_ref: Option<SecretReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfigSpec {
    #[serde(default)]
    pub credentials: ProviderCredentials,
}

/// Named configuration carrying the credentials-secret pointer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ProviderConfigSpec,
}

impl ProviderConfig {
    /// A ProviderConfig pointing at a credentials secret
    pub fn new(name: impl Into<String>, secret: SecretReference) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            spec: ProviderConfigSpec {
                credentials: ProviderCredentials {
                    source: CredentialsSource::ConnectionSecret,
                    connection_secret_ref: Some(secret),
                },
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn secret_ref(&self) -> Option<&SecretReference> {
        self.spec.credentials.connection_secret_ref.as_ref()
    }
}

/// Records that a resource uses a ProviderConfig
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsage {
    pub provider_config: String,
    pub resource: ResourceKey,
}

impl ProviderConfigUsage {
    pub fn for_resource(resource: &dyn ManagedResource) -> Self {
        Self {
            provider_config: resource.provider_config_name().to_string(),
            resource: resource.key(),
        }
    }
}

/// A database that `databaseRef` / `databaseSelector` can point at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    /// Name of the database on the server, when it differs from the object name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,

    pub metadata: ObjectMeta,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            external_name: None,
            metadata: ObjectMeta::named(name),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_external_name(mut self, external_name: impl Into<String>) -> Self {
        self.external_name = Some(external_name.into());
        self
    }

    /// The name to connect to
    pub fn database_name(&self) -> &str {
        self.external_name.as_deref().unwrap_or(&self.metadata.name)
    }
}
