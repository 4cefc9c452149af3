//! Reference catalog use-case service.

use crate::model::reference::Reference;
use crate::repo::reference_repo::{
    ReferenceListOptions, ReferenceRepository, ReferenceUpdate,
};
use crate::repo::{Page, RepoResult};

/// Use-case service wrapper for the reference catalog.
pub struct ReferenceService<R: ReferenceRepository> {
    repo: R,
}

impl<R: ReferenceRepository> ReferenceService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists a new citation.
    pub fn create(&self, reference: &Reference) -> RepoResult<()> {
        self.repo.create_reference(reference)
    }

    /// Lists citations with search/filter/pagination options.
    pub fn retrieve_all(&self, options: &ReferenceListOptions) -> RepoResult<Vec<Reference>> {
        self.repo.retrieve_all(options)
    }

    /// Lists with the `{ pagination, data }` envelope.
    pub fn retrieve_all_paged(
        &self,
        options: &ReferenceListOptions,
    ) -> RepoResult<Page<Reference>> {
        self.repo.retrieve_all_paged(options)
    }

    /// Returns the citation addressed by the natural key.
    pub fn retrieve_by_source_name(&self, source_name: &str) -> RepoResult<Option<Reference>> {
        self.repo.retrieve_by_source_name(source_name)
    }

    /// Merges non-key fields onto the addressed citation.
    pub fn update(&self, update: &ReferenceUpdate) -> RepoResult<Option<Reference>> {
        self.repo.update_reference(update)
    }
}
