//! Core domain logic for a versioned STIX 2.1 object store.
//!
//! Objects are stored as immutable, timestamped version chains keyed by
//! a stable logical id plus a `modified` timestamp. This crate owns the
//! versioning invariants, the latest-version query reduction, mutation
//! with duplicate-version detection, collection content resolution and
//! cascading delete, and the reference catalog.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod resolve;
pub mod search;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attack_object::{
    generate_stix_id, stix_id_is_valid, AttackObject, ContentRef, ExternalReference,
    ObjectAttributes, ObjectType, ObjectValidationError, StixId, WorkflowState,
};
pub use model::reference::Reference;
pub use repo::attack_object_repo::{
    AttackObjectRepository, ObjectListOptions, ObjectRetrievalOptions, ObjectUpdate,
    SqliteObjectRepository, VersionSelector,
};
pub use repo::reference_repo::{
    ReferenceListOptions, ReferenceRepository, ReferenceUpdate, SqliteReferenceRepository,
};
pub use repo::{Page, Pagination, RepoError, RepoResult};
pub use resolve::resolve_content_refs;
pub use service::attack_object_service::AttackObjectService;
pub use service::collection_service::{
    CollectionRetrievalOptions, CollectionService, ResolvedCollection,
};
pub use service::reference_service::ReferenceService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
