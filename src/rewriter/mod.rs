//! Location rewriter
//!
//! Moves a table's metadata pointers from one backend prefix to the other.
//! Only the primary location and the serde `path` parameter change; every
//! other field of the record is carried through as received.

use crate::common::{BackendId, BackendPair, Error, Result};
use crate::metastore::TableDescriptor;

/// Descriptor with its location fields moved onto `target`.
///
/// Returns `Ok(None)` when the table already lives on `target`, and
/// `Error::UnrecognizedLocation` when its location matches neither backend.
pub fn rewrite(
    table: &TableDescriptor,
    target: BackendId,
    backends: &BackendPair,
) -> Result<Option<TableDescriptor>> {
    let location = table.location().ok_or_else(|| {
        Error::UnrecognizedLocation(format!("{} has no storage location", table.id()))
    })?;
    let current = backends.locate(location).ok_or_else(|| {
        Error::UnrecognizedLocation(format!("{}: {}", table.id(), location))
    })?;
    if current == target {
        return Ok(None);
    }

    let from = backends.get(current);
    let to = backends.get(target);
    let new_location = to
        .rebase(location, from)
        .ok_or_else(|| Error::Internal(format!("{} is not under {}", location, from.prefix)))?;
    let mut updated = table.with_location(&new_location)?;

    if let Some(path) = table.serde_path() {
        match to.rebase(path, from) {
            Some(new_path) => updated = updated.with_serde_path(&new_path)?,
            None if !to.holds(path) => {
                tracing::warn!(
                    "{}: serde path {} is on neither backend, left unchanged",
                    table.id(),
                    path
                );
            }
            None => {}
        }
    }

    tracing::debug!(
        "{}: {} -> {}",
        table.id(),
        location,
        updated.location().unwrap_or_default()
    );
    Ok(Some(updated))
}
