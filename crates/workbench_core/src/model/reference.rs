//! Reference catalog model.
//!
//! References are citation records keyed by `source_name`. Unlike the
//! versioned objects they are not version-chained; updates replace the
//! single record addressed by the natural key.

use serde::{Deserialize, Serialize};

/// One citation entry in the shared reference catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Natural key. Immutable once created.
    pub source_name: String,
    pub description: Option<String>,
    pub url: Option<String>,
}

impl Reference {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            description: None,
            url: None,
        }
    }
}
