//! Versioned STIX object model.
//!
//! # Responsibility
//! - Define the common envelope shared by techniques, tactics, software,
//!   collections, marking definitions and the other object kinds.
//! - Provide identifier generation/validation and new-version helpers.
//!
//! # Invariants
//! - (`stix_id`, `modified`) is the natural key of a stored version.
//! - `stix_id` starts with the STIX type string of its payload.
//! - `created` is constant across all versions sharing one `stix_id`;
//!   `next_version` preserves it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable logical identifier in STIX `<type>--<uuid>` form.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type StixId = String;

static STIX_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-z][a-z0-9-]*--[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
    )
    .expect("valid stix id regex")
});

/// Returns whether `value` has the `<type>--<uuid>` identifier shape.
pub fn stix_id_is_valid(value: &str) -> bool {
    STIX_ID_RE.is_match(value)
}

/// Generates a fresh identifier for the given object kind.
pub fn generate_stix_id(kind: ObjectType) -> StixId {
    format!("{}--{}", kind.as_str(), Uuid::new_v4())
}

/// Discriminator selecting the concrete object kind.
///
/// The STIX type string doubles as the identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    #[serde(rename = "attack-pattern")]
    Technique,
    #[serde(rename = "x-mitre-tactic")]
    Tactic,
    #[serde(rename = "malware")]
    Malware,
    #[serde(rename = "tool")]
    Tool,
    #[serde(rename = "course-of-action")]
    Mitigation,
    #[serde(rename = "identity")]
    Identity,
    #[serde(rename = "marking-definition")]
    MarkingDefinition,
    #[serde(rename = "relationship")]
    Relationship,
    #[serde(rename = "x-mitre-collection")]
    Collection,
}

impl ObjectType {
    /// Returns the STIX type string stored in the `type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Technique => "attack-pattern",
            Self::Tactic => "x-mitre-tactic",
            Self::Malware => "malware",
            Self::Tool => "tool",
            Self::Mitigation => "course-of-action",
            Self::Identity => "identity",
            Self::MarkingDefinition => "marking-definition",
            Self::Relationship => "relationship",
            Self::Collection => "x-mitre-collection",
        }
    }

    /// Parses a STIX type string back into a discriminator.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "attack-pattern" => Some(Self::Technique),
            "x-mitre-tactic" => Some(Self::Tactic),
            "malware" => Some(Self::Malware),
            "tool" => Some(Self::Tool),
            "course-of-action" => Some(Self::Mitigation),
            "identity" => Some(Self::Identity),
            "marking-definition" => Some(Self::MarkingDefinition),
            "relationship" => Some(Self::Relationship),
            "x-mitre-collection" => Some(Self::Collection),
            _ => None,
        }
    }
}

/// Editorial workflow state attached to a stored version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowState {
    /// Version is being drafted.
    WorkInProgress,
    /// Version is ready for review.
    AwaitingReview,
    /// Version passed review.
    Reviewed,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkInProgress => "work-in-progress",
            Self::AwaitingReview => "awaiting-review",
            Self::Reviewed => "reviewed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "work-in-progress" => Some(Self::WorkInProgress),
            "awaiting-review" => Some(Self::AwaitingReview),
            "reviewed" => Some(Self::Reviewed),
            _ => None,
        }
    }
}

/// Citation entry carried on the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReference {
    pub source_name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub external_id: Option<String>,
}

/// Pointer to one exact version of another object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    /// Logical id of the referenced object.
    pub object_ref: StixId,
    /// Exact `modified` timestamp of the referenced version, epoch ms.
    pub object_modified: i64,
}

/// Kind-specific payload, dispatched by the STIX `type` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectAttributes {
    #[serde(rename = "attack-pattern")]
    Technique {
        #[serde(default)]
        platforms: Vec<String>,
        #[serde(default)]
        detection: Option<String>,
        #[serde(default)]
        is_subtechnique: bool,
    },
    #[serde(rename = "x-mitre-tactic")]
    Tactic {
        #[serde(default)]
        shortname: Option<String>,
    },
    #[serde(rename = "malware")]
    Malware {
        #[serde(default)]
        platforms: Vec<String>,
        #[serde(default)]
        aliases: Vec<String>,
    },
    #[serde(rename = "tool")]
    Tool {
        #[serde(default)]
        platforms: Vec<String>,
        #[serde(default)]
        aliases: Vec<String>,
    },
    #[serde(rename = "course-of-action")]
    Mitigation {},
    #[serde(rename = "identity")]
    Identity {
        #[serde(default)]
        identity_class: Option<String>,
    },
    #[serde(rename = "marking-definition")]
    MarkingDefinition {
        #[serde(default)]
        definition_type: Option<String>,
        #[serde(default)]
        statement: Option<String>,
    },
    #[serde(rename = "relationship")]
    Relationship {
        relationship_type: String,
        source_ref: StixId,
        target_ref: StixId,
    },
    #[serde(rename = "x-mitre-collection")]
    Collection {
        /// Ordered list of exact object versions owned by the collection.
        #[serde(default)]
        contents: Vec<ContentRef>,
    },
}

impl ObjectAttributes {
    /// Returns the discriminator for this payload.
    pub fn kind(&self) -> ObjectType {
        match self {
            Self::Technique { .. } => ObjectType::Technique,
            Self::Tactic { .. } => ObjectType::Tactic,
            Self::Malware { .. } => ObjectType::Malware,
            Self::Tool { .. } => ObjectType::Tool,
            Self::Mitigation {} => ObjectType::Mitigation,
            Self::Identity { .. } => ObjectType::Identity,
            Self::MarkingDefinition { .. } => ObjectType::MarkingDefinition,
            Self::Relationship { .. } => ObjectType::Relationship,
            Self::Collection { .. } => ObjectType::Collection,
        }
    }
}

/// Validation failures for versioned object records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectValidationError {
    /// Identifier does not match the `<type>--<uuid>` shape.
    MalformedStixId(String),
    /// Identifier prefix does not match the payload discriminator.
    TypePrefixMismatch {
        stix_id: String,
        expected: &'static str,
    },
    /// `created` or `modified` is not a positive epoch-ms value.
    NonPositiveTimestamp(&'static str),
}

impl Display for ObjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedStixId(value) => write!(f, "malformed stix id: `{value}`"),
            Self::TypePrefixMismatch { stix_id, expected } => write!(
                f,
                "stix id `{stix_id}` does not start with type `{expected}`"
            ),
            Self::NonPositiveTimestamp(field) => {
                write!(f, "`{field}` must be a positive epoch-ms timestamp")
            }
        }
    }
}

impl Error for ObjectValidationError {}

/// Canonical versioned object record.
///
/// One row per stored version; the envelope fields below are shared by
/// every kind, while `attributes` carries the kind-specific payload.
/// The wire shape flattens the payload next to the envelope, so a
/// serialized record reads as one STIX object with a `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackObject {
    /// Stable logical id, immutable once created.
    #[serde(rename = "id")]
    pub stix_id: StixId,
    /// Version timestamp, epoch ms. Part of the natural key.
    pub modified: i64,
    /// Creation timestamp, epoch ms. Constant across versions.
    pub created: i64,
    /// STIX specification version, e.g. `2.1`.
    pub spec_version: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Identity that created the first version.
    pub created_by_ref: Option<StixId>,
    /// Identity that produced this version.
    #[serde(rename = "x_mitre_modified_by_ref")]
    pub modified_by_ref: Option<StixId>,
    /// ATT&CK data-spec version stamped on the version.
    #[serde(rename = "x_mitre_attack_spec_version")]
    pub attack_spec_version: Option<String>,
    pub external_references: Vec<ExternalReference>,
    pub object_marking_refs: Vec<StixId>,
    /// Version has been superseded/withdrawn.
    pub revoked: bool,
    /// Version is no longer recommended.
    #[serde(rename = "x_mitre_deprecated")]
    pub deprecated: bool,
    /// Editorial status, not part of the STIX payload.
    pub workflow_state: Option<WorkflowState>,
    #[serde(flatten)]
    pub attributes: ObjectAttributes,
}

impl AttackObject {
    /// Creates the first version of a new object with a generated id.
    ///
    /// `timestamp_ms` seeds both `created` and `modified`.
    pub fn new(attributes: ObjectAttributes, name: impl Into<String>, timestamp_ms: i64) -> Self {
        let stix_id = generate_stix_id(attributes.kind());
        Self::with_id(stix_id, attributes, name, timestamp_ms)
    }

    /// Creates the first version of an object whose identity already
    /// exists externally (import/sync paths).
    ///
    /// # Invariants
    /// - The provided `stix_id` must remain stable for the object lifetime.
    /// - This constructor does not validate; write paths call `validate()`.
    pub fn with_id(
        stix_id: StixId,
        attributes: ObjectAttributes,
        name: impl Into<String>,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            stix_id,
            modified: timestamp_ms,
            created: timestamp_ms,
            spec_version: "2.1".to_string(),
            name: Some(name.into()),
            description: None,
            created_by_ref: None,
            modified_by_ref: None,
            attack_spec_version: None,
            external_references: Vec::new(),
            object_marking_refs: Vec::new(),
            revoked: false,
            deprecated: false,
            workflow_state: None,
            attributes,
        }
    }

    /// Returns the discriminator of this object's payload.
    pub fn kind(&self) -> ObjectType {
        self.attributes.kind()
    }

    /// Clones this version into a successor with a later `modified`.
    ///
    /// `stix_id` and `created` are preserved, keeping the version chain
    /// addressable under one logical id.
    pub fn next_version(&self, modified_ms: i64) -> Self {
        let mut version = self.clone();
        version.modified = modified_ms;
        version
    }

    /// Checks identifier shape, prefix/kind agreement, timestamp sanity
    /// and embedded reference ids.
    pub fn validate(&self) -> Result<(), ObjectValidationError> {
        if !stix_id_is_valid(&self.stix_id) {
            return Err(ObjectValidationError::MalformedStixId(self.stix_id.clone()));
        }

        let expected = self.kind().as_str();
        match self.stix_id.split_once("--") {
            Some((prefix, _)) if prefix == expected => {}
            _ => {
                return Err(ObjectValidationError::TypePrefixMismatch {
                    stix_id: self.stix_id.clone(),
                    expected,
                });
            }
        }

        if self.created <= 0 {
            return Err(ObjectValidationError::NonPositiveTimestamp("created"));
        }
        if self.modified <= 0 {
            return Err(ObjectValidationError::NonPositiveTimestamp("modified"));
        }

        match &self.attributes {
            ObjectAttributes::Relationship {
                source_ref,
                target_ref,
                ..
            } => {
                for reference in [source_ref, target_ref] {
                    if !stix_id_is_valid(reference) {
                        return Err(ObjectValidationError::MalformedStixId(reference.clone()));
                    }
                }
            }
            ObjectAttributes::Collection { contents } => {
                for entry in contents {
                    if !stix_id_is_valid(&entry.object_ref) {
                        return Err(ObjectValidationError::MalformedStixId(
                            entry.object_ref.clone(),
                        ));
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        generate_stix_id, stix_id_is_valid, AttackObject, ContentRef, ObjectAttributes,
        ObjectType, ObjectValidationError, WorkflowState,
    };

    const T1: i64 = 1_700_000_000_000;

    fn technique() -> ObjectAttributes {
        ObjectAttributes::Technique {
            platforms: vec!["linux".to_string()],
            detection: None,
            is_subtechnique: false,
        }
    }

    #[test]
    fn generated_ids_are_valid_and_prefixed() {
        for kind in [
            ObjectType::Technique,
            ObjectType::Tactic,
            ObjectType::Collection,
            ObjectType::MarkingDefinition,
        ] {
            let id = generate_stix_id(kind);
            assert!(stix_id_is_valid(&id), "generated id `{id}` should be valid");
            assert!(id.starts_with(kind.as_str()));
        }
    }

    #[test]
    fn id_shape_rejects_bad_inputs() {
        assert!(!stix_id_is_valid(""));
        assert!(!stix_id_is_valid("attack-pattern"));
        assert!(!stix_id_is_valid("attack-pattern--not-a-uuid"));
        assert!(!stix_id_is_valid(
            "Attack-Pattern--00000000-0000-4000-8000-000000000001"
        ));
        assert!(stix_id_is_valid(
            "attack-pattern--00000000-0000-4000-8000-000000000001"
        ));
    }

    #[test]
    fn new_sets_defaults() {
        let object = AttackObject::new(technique(), "Process Injection", T1);

        assert_eq!(object.kind(), ObjectType::Technique);
        assert_eq!(object.created, T1);
        assert_eq!(object.modified, T1);
        assert_eq!(object.spec_version, "2.1");
        assert_eq!(object.name.as_deref(), Some("Process Injection"));
        assert!(!object.revoked);
        assert!(!object.deprecated);
        assert_eq!(object.workflow_state, None);
        object.validate().unwrap();
    }

    #[test]
    fn next_version_preserves_identity_and_created() {
        let first = AttackObject::new(technique(), "Phishing", T1);
        let second = first.next_version(T1 + 60_000);

        assert_eq!(second.stix_id, first.stix_id);
        assert_eq!(second.created, first.created);
        assert_eq!(second.modified, T1 + 60_000);
    }

    #[test]
    fn validate_rejects_prefix_mismatch() {
        let object = AttackObject::with_id(
            "x-mitre-tactic--00000000-0000-4000-8000-000000000001".to_string(),
            technique(),
            "Wrong prefix",
            T1,
        );

        let err = object.validate().unwrap_err();
        assert!(matches!(
            err,
            ObjectValidationError::TypePrefixMismatch { expected: "attack-pattern", .. }
        ));
    }

    #[test]
    fn validate_rejects_malformed_content_refs() {
        let object = AttackObject::new(
            ObjectAttributes::Collection {
                contents: vec![ContentRef {
                    object_ref: "garbage".to_string(),
                    object_modified: T1,
                }],
            },
            "Bad collection",
            T1,
        );

        let err = object.validate().unwrap_err();
        assert_eq!(err, ObjectValidationError::MalformedStixId("garbage".to_string()));
    }

    #[test]
    fn serialization_uses_expected_wire_fields() {
        let mut object = AttackObject::with_id(
            "x-mitre-tactic--11111111-2222-4333-8444-555555555555".to_string(),
            ObjectAttributes::Tactic {
                shortname: Some("execution".to_string()),
            },
            "Execution",
            T1,
        );
        object.deprecated = true;
        object.workflow_state = Some(WorkflowState::WorkInProgress);
        object.attack_spec_version = Some("3.2.0".to_string());

        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(
            json["id"],
            "x-mitre-tactic--11111111-2222-4333-8444-555555555555"
        );
        assert_eq!(json["type"], "x-mitre-tactic");
        assert_eq!(json["modified"], T1);
        assert_eq!(json["shortname"], "execution");
        assert_eq!(json["x_mitre_deprecated"], true);
        assert_eq!(json["x_mitre_attack_spec_version"], "3.2.0");
        assert_eq!(json["workflow_state"], "work-in-progress");

        let decoded: AttackObject = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, object);
    }
}
