//! Full-text search support for store queries.
//!
//! # Responsibility
//! - Turn caller-supplied search terms into safe FTS5 match expressions.
//! - Classify FTS syntax failures separately from transport errors.

pub mod fts;
