//! Project metadata record.
//!
//! # Responsibility
//! - Define the per-project isolation record tracked by the registry.
//!
//! # Invariants
//! - Each project owns exactly one storage location; all of its entities
//!   and relationships live in that location's store.
//! - `name` is unique case-insensitively across the registry.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Isolation boundary owning one storage location and one graph store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Stable project id, generated at creation.
    pub id: String,
    /// Display name, unique case-insensitively.
    pub name: String,
    /// Freeform description.
    pub description: String,
    /// Directory holding this project's graph store.
    pub storage_location: PathBuf,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms timestamp of the last successful registry lookup.
    pub last_accessed: i64,
}
