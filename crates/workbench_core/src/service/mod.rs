//! Use-case services over repository implementations.
//!
//! # Responsibility
//! - Provide per-entity entry points mirroring the REST surface:
//!   retrieve-all, retrieve-by-id, create, update, delete.
//! - Keep multi-step orchestration (content expansion, cascading
//!   delete) out of the persistence layer.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - Services remain storage-agnostic.

pub mod attack_object_service;
pub mod collection_service;
pub mod reference_service;
