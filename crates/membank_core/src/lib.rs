//! Core data-access layer for the membank project graph.
//! This crate is the single source of truth for storage invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;

pub use config::StoreConfig;
pub use db::pool::{Clock, ConnectionPool, PoolStats, SystemClock};
pub use db::{open_graph_db, open_graph_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{Entity, EntityId, Observation};
pub use model::project::Project;
pub use model::relationship::Relationship;
pub use model::ValidationError;
pub use registry::ProjectRegistry;
pub use repo::entity_repo::{
    CreatedEntity, EntityUpdate, GraphRepoError, GraphRepoResult, NewEntity,
    SqliteEntityRepository, VerificationStatus,
};
pub use repo::relationship_repo::{
    NewRelationship, RelationshipFilter, SqliteRelationshipRepository,
};
pub use repo::traversal::{Direction, GraphData, RelatedQuery, SqliteTraversalQueries};
pub use service::graph_service::GraphService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
