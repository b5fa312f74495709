//! Credential resolution
//!
//! Turns a resource's ProviderConfig reference into raw connection details:
//! record the usage, read the ProviderConfig, follow its secret reference
//! and return the secret's data.

use crate::context::{ConfigStore, ReconcileContext, SecretStore, UsageTracker};
use crate::error::{ConnectError, Error, Result, StoreError};
use crate::provider::{ConnectionDetails, ProviderConfigUsage};
use crate::resource::ManagedResource;

/// Resolves a resource into the credentials its session needs
#[derive(Clone, Copy)]
pub struct CredentialResolver<'a> {
    configs: &'a dyn ConfigStore,
    secrets: &'a dyn SecretStore,
    usage: &'a dyn UsageTracker,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(
        configs: &'a dyn ConfigStore,
        secrets: &'a dyn SecretStore,
        usage: &'a dyn UsageTracker,
    ) -> Self {
        Self {
            configs,
            secrets,
            usage,
        }
    }

    /// Resolve the connection details for `resource`
    ///
    /// Usage is recorded before the ProviderConfig is read, so a missing
    /// ProviderConfig can still not be deleted out from under a resource
    /// that names it.
    pub fn resolve(
        &self,
        ctx: &ReconcileContext,
        resource: &dyn ManagedResource,
    ) -> Result<ConnectionDetails> {
        ctx.check()?;

        let usage = ProviderConfigUsage::for_resource(resource);
        self.usage
            .track(ctx, &usage)
            .map_err(|e| lift(e, ConnectError::TrackingFailed))?;

        let name = resource.provider_config_name();
        let config = self
            .configs
            .get_provider_config(ctx, name)
            .map_err(|e| {
                lift(e, |source| ConnectError::ConfigLookup {
                    name: name.to_string(),
                    source,
                })
            })?
            .ok_or_else(|| ConnectError::ConfigNotFound {
                name: name.to_string(),
            })?;

        let secret_ref = config
            .secret_ref()
            .ok_or_else(|| ConnectError::MissingSecretRef {
                name: name.to_string(),
            })?;

        log::debug!(
            "{}: reading credentials from {}/{}",
            resource.key(),
            secret_ref.namespace,
            secret_ref.name
        );

        let details = self
            .secrets
            .get_secret(ctx, &secret_ref.namespace, &secret_ref.name)
            .map_err(|e| {
                lift(e, |source| ConnectError::SecretLookup {
                    namespace: secret_ref.namespace.clone(),
                    name: secret_ref.name.clone(),
                    source,
                })
            })?
            .ok_or_else(|| ConnectError::SecretNotFound {
                namespace: secret_ref.namespace.clone(),
                name: secret_ref.name.clone(),
            })?;

        Ok(details)
    }
}

/// Cancelled lookups surface as cancellation, everything else as a connect error
fn lift(err: StoreError, wrap: impl FnOnce(StoreError) -> ConnectError) -> Error {
    match err {
        StoreError::Cancelled => Error::Cancelled,
        other => Error::Connect(wrap(other)),
    }
}
