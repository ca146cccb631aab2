//! Relationship domain model.
//!
//! # Responsibility
//! - Define the directed, typed edge record between two entities.
//!
//! # Invariants
//! - `from_id`/`to_id` reference entities that existed at creation time.
//! - Duplicate `(from, to, type)` triples are permitted; `id` alone is
//!   unique.

use crate::model::entity::EntityId;
use crate::model::{require_non_blank, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directed, typed edge between two entities in one project store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Stable relationship id, generated at creation.
    pub id: String,
    /// Source entity id.
    pub from_id: EntityId,
    /// Target entity id.
    pub to_id: EntityId,
    /// Freeform edge category. Serialized as `type` to match external
    /// schema naming.
    #[serde(rename = "type")]
    pub kind: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

impl Relationship {
    /// Creates a relationship with a generated stable id.
    pub fn new(
        from_id: impl Into<EntityId>,
        to_id: impl Into<EntityId>,
        kind: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            kind: kind.into(),
            created_at,
        }
    }

    /// Checks required-field invariants before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank(&self.from_id, "from_id")?;
        require_non_blank(&self.to_id, "to_id")?;
        require_non_blank(&self.kind, "type")?;
        Ok(())
    }
}
