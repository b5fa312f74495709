//! Resolution of `databaseRef` and `databaseSelector`
//!
//! An explicit `database` always wins. Otherwise a reference names a
//! Database object, and a selector picks the first Database (by name) whose
//! labels match. The resolved name is written into the in-memory
//! `forProvider.database` for this pass only.

use crate::context::{DatabaseCatalog, ReconcileContext};
use crate::error::{Error, ReferenceError, Result, StoreError};
use crate::resource::ManagedResource;

/// Resolve the target database in place
///
/// Returns the resolved name, or `None` when the resource targets no
/// database at all (the session's default).
pub fn resolve_database(
    ctx: &ReconcileContext,
    catalog: &dyn DatabaseCatalog,
    resource: &mut dyn ManagedResource,
) -> Result<Option<String>> {
    ctx.check()?;

    let target = resource.target();
    if let Some(database) = &target.database {
        return Ok(Some(database.clone()));
    }

    let resolved = if let Some(reference) = &target.database_ref {
        let database = catalog
            .get_database(ctx, &reference.name)
            .map_err(lookup)?
            .ok_or_else(|| ReferenceError::NotFound {
                name: reference.name.clone(),
            })?;
        database.database_name().to_string()
    } else if let Some(selector) = &target.database_selector {
        let mut candidates = catalog.list_databases(ctx).map_err(lookup)?;
        candidates.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        let database = candidates
            .into_iter()
            .find(|db| selector.matches(&db.metadata.labels))
            .ok_or_else(|| ReferenceError::NoMatch {
                selector: selector.to_string(),
            })?;
        database.database_name().to_string()
    } else {
        return Ok(None);
    };

    log::debug!("{}: resolved database {resolved}", resource.key());
    resource.target_mut().database = Some(resolved.clone());
    Ok(Some(resolved))
}

fn lookup(err: StoreError) -> Error {
    match err {
        StoreError::Cancelled => Error::Cancelled,
        other => Error::References(ReferenceError::Lookup(other)),
    }
}
