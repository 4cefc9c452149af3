//! Collection use-case service.
//!
//! # Responsibility
//! - Provide collection-specific retrieval with optional content
//!   expansion.
//! - Orchestrate cascading delete of a collection's content versions.
//!
//! # Invariants
//! - Only `x-mitre-collection` objects pass through this service.
//! - Cascading delete removes exact content versions before the owning
//!   collection version; sub-deletes are not rolled back on failure, and
//!   the first failure aborts the remainder.

use crate::model::attack_object::{AttackObject, ContentRef, ObjectAttributes, ObjectType};
use crate::repo::attack_object_repo::{
    AttackObjectRepository, ObjectListOptions, ObjectRetrievalOptions,
};
use crate::repo::{RepoError, RepoResult};
use crate::resolve::{for_each_ref, resolve_content_refs};
use log::info;

/// Options for id-scoped collection retrieval.
#[derive(Debug, Clone)]
pub struct CollectionRetrievalOptions {
    /// Version selector, `all` or `latest`.
    pub versions: String,
    /// Expand content references into resolved objects.
    pub retrieve_contents: bool,
}

impl Default for CollectionRetrievalOptions {
    fn default() -> Self {
        Self {
            versions: "latest".to_string(),
            retrieve_contents: false,
        }
    }
}

/// One collection version with its optionally expanded contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCollection {
    pub collection: AttackObject,
    /// Resolved content versions, input order, unknown refs dropped.
    /// Empty when expansion was not requested.
    pub contents: Vec<AttackObject>,
}

/// Collection service facade over the generic object repository.
pub struct CollectionService<R: AttackObjectRepository> {
    repo: R,
}

impl<R: AttackObjectRepository> CollectionService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists a new collection version.
    pub fn create(&self, object: &AttackObject) -> RepoResult<()> {
        if object.kind() != ObjectType::Collection {
            return Err(RepoError::InvalidData(
                "collection service only accepts x-mitre-collection objects".to_string(),
            ));
        }
        self.repo.create_object(object)
    }

    /// Lists the latest version per collection id.
    pub fn retrieve_all(&self, options: &ObjectListOptions) -> RepoResult<Vec<AttackObject>> {
        let mut options = options.clone();
        options.kind = Some(ObjectType::Collection);
        self.repo.retrieve_all(&options)
    }

    /// Retrieves collection versions, optionally expanding contents.
    pub fn retrieve_by_id(
        &self,
        stix_id: &str,
        options: &CollectionRetrievalOptions,
    ) -> RepoResult<Vec<ResolvedCollection>> {
        let object_options = ObjectRetrievalOptions {
            versions: options.versions.clone(),
        };
        self.repo
            .retrieve_by_id(stix_id, &object_options)?
            .into_iter()
            .filter(|object| object.kind() == ObjectType::Collection)
            .map(|collection| {
                let contents = if options.retrieve_contents {
                    resolve_content_refs(&self.repo, collection_contents(&collection))?
                } else {
                    Vec::new()
                };
                Ok(ResolvedCollection {
                    collection,
                    contents,
                })
            })
            .collect()
    }

    /// Removes every version of a collection, optionally cascading to
    /// the exact object versions listed in each version's contents.
    ///
    /// Returns the removed collection versions. Deleting an unknown id
    /// removes zero records and is not an error.
    pub fn delete(
        &self,
        stix_id: &str,
        delete_all_contents: bool,
    ) -> RepoResult<Vec<AttackObject>> {
        let versions = self.repo.retrieve_by_id(
            stix_id,
            &ObjectRetrievalOptions {
                versions: "all".to_string(),
            },
        )?;

        let mut removed = Vec::new();
        for collection in versions
            .iter()
            .filter(|object| object.kind() == ObjectType::Collection)
        {
            if delete_all_contents {
                let removed_contents =
                    for_each_ref(collection_contents(collection), |entry| {
                        self.repo
                            .delete_version(&entry.object_ref, entry.object_modified)
                    })?;
                info!(
                    "event=collection_cascade_delete module=service status=ok stix_id={} modified={} removed_contents={}",
                    collection.stix_id,
                    collection.modified,
                    removed_contents.len()
                );
            }

            if let Some(document) = self
                .repo
                .delete_version(&collection.stix_id, collection.modified)?
            {
                removed.push(document);
            }
        }

        Ok(removed)
    }
}

fn collection_contents(object: &AttackObject) -> &[ContentRef] {
    match &object.attributes {
        ObjectAttributes::Collection { contents } => contents,
        _ => &[],
    }
}
