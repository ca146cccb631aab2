//! Entity domain model and observation blob codec.
//!
//! # Responsibility
//! - Define the canonical entity record and its observation sub-notes.
//! - Own encode/decode rules for the serialized observation list.
//!
//! # Invariants
//! - `id` is stable and never reused for another entity.
//! - The full observation list round-trips through one JSON blob stored on
//!   the entity row; observations are never independent rows.
//! - `name`, `kind` and `description` are non-blank for persisted entities.

use crate::model::{require_non_blank, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for entities within one project store.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EntityId = String;

/// Freeform note attached to one entity.
///
/// Unique within its owning entity; always persisted as part of the owning
/// entity's observation blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Stable observation id (`obs_` + hex).
    pub id: String,
    /// Note body.
    pub text: String,
    /// Epoch ms creation timestamp.
    #[serde(default)]
    pub created_at: i64,
}

impl Observation {
    /// Creates an observation with a freshly generated id.
    pub fn new(text: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: format!("obs_{}", Uuid::new_v4().simple()),
            text: text.into(),
            created_at,
        }
    }
}

/// Typed node in the project graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable entity id, generated at creation.
    pub id: EntityId,
    /// User-facing entity name.
    pub name: String,
    /// Freeform entity category. Serialized as `type` to match external
    /// schema naming.
    #[serde(rename = "type")]
    pub kind: String,
    /// Longer freeform description.
    pub description: String,
    /// Ordered sub-notes, persisted as one blob on the entity row.
    pub observations: Vec<Observation>,
    /// Optional grouping parent. Cycles are not prevented.
    pub parent_id: Option<EntityId>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Entity {
    /// Creates an entity with a generated stable id and empty observations.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind: kind.into(),
            description: description.into(),
            observations: Vec::new(),
            parent_id: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Checks required-field invariants before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank(&self.name, "name")?;
        require_non_blank(&self.kind, "type")?;
        require_non_blank(&self.description, "description")?;
        Ok(())
    }
}

/// Encodes an observation list into the persisted blob form.
pub fn encode_observations(observations: &[Observation]) -> Result<String, serde_json::Error> {
    serde_json::to_string(observations)
}

/// Decodes the persisted blob form back into an observation list.
pub fn decode_observations(blob: &str) -> Result<Vec<Observation>, serde_json::Error> {
    serde_json::from_str(blob)
}

#[cfg(test)]
mod tests {
    use super::{decode_observations, encode_observations, Entity, Observation};
    use crate::model::ValidationError;

    #[test]
    fn new_entity_has_fresh_id_and_matching_stamps() {
        let entity = Entity::new("Login", "feature", "login flow", 1_000);
        assert!(!entity.id.is_empty());
        assert_eq!(entity.created_at, 1_000);
        assert_eq!(entity.updated_at, 1_000);
        assert!(entity.observations.is_empty());
        assert!(entity.parent_id.is_none());
    }

    #[test]
    fn validate_rejects_blank_kind() {
        let entity = Entity::new("Login", "  ", "login flow", 0);
        assert_eq!(
            entity.validate().unwrap_err(),
            ValidationError::BlankField { field: "type" }
        );
    }

    #[test]
    fn observation_blob_roundtrip() {
        let list = vec![
            Observation::new("first", 1),
            Observation::new("second", 2),
        ];
        let blob = encode_observations(&list).unwrap();
        assert_eq!(decode_observations(&blob).unwrap(), list);
    }

    #[test]
    fn decode_rejects_garbage_blob() {
        assert!(decode_observations("not json").is_err());
    }

    #[test]
    fn observation_ids_are_prefixed_and_unique() {
        let a = Observation::new("x", 0);
        let b = Observation::new("x", 0);
        assert!(a.id.starts_with("obs_"));
        assert_ne!(a.id, b.id);
    }
}
