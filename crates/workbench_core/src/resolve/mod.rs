//! Cross-reference resolution for collection contents.
//!
//! # Responsibility
//! - Resolve ordered `{object_ref, object_modified}` lists to concrete
//!   stored versions.
//! - Own the batch aggregation policy shared with cascading content
//!   removal: first-error-wins, order-preserving, drop-missing.
//!
//! # Invariants
//! - Relative order of resolved objects matches the input list.
//! - References that resolve to nothing are dropped silently.
//! - The first lookup failure aborts the whole batch; no partial result
//!   is returned.

use crate::model::attack_object::{AttackObject, ContentRef};
use crate::repo::attack_object_repo::AttackObjectRepository;
use crate::repo::RepoResult;

/// Resolves every content reference to its exact stored version.
///
/// Unknown references are skipped; the survivors keep their relative
/// order. Any repository failure aborts the batch and surfaces to the
/// caller.
pub fn resolve_content_refs<R: AttackObjectRepository>(
    repo: &R,
    refs: &[ContentRef],
) -> RepoResult<Vec<AttackObject>> {
    for_each_ref(refs, |entry| {
        repo.retrieve_version(&entry.object_ref, entry.object_modified)
    })
}

/// Runs `op` over every reference in input order and collects the hits.
///
/// This is the single aggregation primitive for content batches: the
/// first `Err` aborts the remaining references, `Ok(None)` entries are
/// dropped, and `Ok(Some)` results keep their relative order. Cascading
/// delete reuses it with a removal operation.
pub(crate) fn for_each_ref<T, E>(
    refs: &[ContentRef],
    mut op: impl FnMut(&ContentRef) -> Result<Option<T>, E>,
) -> Result<Vec<T>, E> {
    let mut results = Vec::with_capacity(refs.len());
    for entry in refs {
        if let Some(value) = op(entry)? {
            results.push(value);
        }
    }
    Ok(results)
}
