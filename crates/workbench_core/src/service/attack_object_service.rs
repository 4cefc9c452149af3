//! Versioned object use-case service.
//!
//! # Responsibility
//! - Provide stable per-object entry points for callers of the store.
//! - Delegate persistence to repository implementations.

use crate::model::attack_object::AttackObject;
use crate::repo::attack_object_repo::{
    AttackObjectRepository, ObjectListOptions, ObjectRetrievalOptions, ObjectUpdate,
};
use crate::repo::{Page, RepoResult};

/// Use-case service wrapper for versioned object operations.
pub struct AttackObjectService<R: AttackObjectRepository> {
    repo: R,
}

impl<R: AttackObjectRepository> AttackObjectService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists a new object version through repository persistence.
    pub fn create(&self, object: &AttackObject) -> RepoResult<()> {
        self.repo.create_object(object)
    }

    /// Appends a new version on top of the current latest.
    ///
    /// # Contract
    /// - Preserves `stix_id` and `created` from the latest version.
    /// - Returns `Ok(None)` when the id is unknown.
    pub fn append_version(
        &self,
        stix_id: &str,
        modified_ms: i64,
    ) -> RepoResult<Option<AttackObject>> {
        let Some(latest) = self.repo.retrieve_latest(stix_id)? else {
            return Ok(None);
        };
        let version = latest.next_version(modified_ms);
        self.repo.create_object(&version)?;
        Ok(Some(version))
    }

    /// Lists the latest version per logical id.
    pub fn retrieve_all(&self, options: &ObjectListOptions) -> RepoResult<Vec<AttackObject>> {
        self.repo.retrieve_all(options)
    }

    /// Lists with the `{ pagination, data }` envelope.
    pub fn retrieve_all_paged(
        &self,
        options: &ObjectListOptions,
    ) -> RepoResult<Page<AttackObject>> {
        self.repo.retrieve_all_paged(options)
    }

    /// Retrieves versions of one id per the `versions` selector.
    pub fn retrieve_by_id(
        &self,
        stix_id: &str,
        options: &ObjectRetrievalOptions,
    ) -> RepoResult<Vec<AttackObject>> {
        self.repo.retrieve_by_id(stix_id, options)
    }

    /// Replaces the exact version addressed by (`stix_id`, `modified`).
    pub fn update_version(
        &self,
        stix_id: &str,
        modified: i64,
        update: &ObjectUpdate,
    ) -> RepoResult<Option<AttackObject>> {
        self.repo.update_version(stix_id, modified, update)
    }

    /// Removes the exact version addressed by (`stix_id`, `modified`).
    pub fn delete_version(
        &self,
        stix_id: &str,
        modified: i64,
    ) -> RepoResult<Option<AttackObject>> {
        self.repo.delete_version(stix_id, modified)
    }

    /// Removes every version of one id.
    pub fn delete_all_versions(&self, stix_id: &str) -> RepoResult<Vec<AttackObject>> {
        self.repo.delete_all_versions(stix_id)
    }
}
