//! Domain model for versioned STIX objects and the reference catalog.
//!
//! # Responsibility
//! - Define the canonical envelope shared by every versioned object kind.
//! - Keep per-kind payloads behind one tagged discriminator.
//!
//! # Invariants
//! - Every versioned object is addressed by (`stix_id`, `modified`).
//! - `created` stays constant across all versions of one `stix_id`.

pub mod attack_object;
pub mod reference;
