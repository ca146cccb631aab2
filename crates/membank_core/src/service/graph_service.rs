//! Graph data-access service and error boundary.
//!
//! # Responsibility
//! - Expose the full project/entity/relationship/observation surface to
//!   downstream collaborators (dashboard, tool invocation, bookkeeping).
//! - Convert every lower-layer failure to the operation's documented
//!   sentinel (`None`, `false`, empty collection) with a logged cause.
//!
//! # Invariants
//! - No storage exception crosses this boundary.
//! - Absent records are normal `None`/`false` returns, not errors.
//! - Deleting a project removes its registry record, evicts its cached
//!   connection and deletes its whole storage location.

use crate::config::StoreConfig;
use crate::db::pool::{Clock, ConnectionPool};
use crate::db::DbError;
use crate::model::entity::{Entity, Observation};
use crate::model::project::Project;
use crate::model::relationship::Relationship;
use crate::model::require_non_blank;
use crate::registry::ProjectRegistry;
use crate::repo::entity_repo::{
    CreatedEntity, EntityUpdate, GraphRepoError, NewEntity, SqliteEntityRepository,
    VerificationStatus,
};
use crate::repo::relationship_repo::{
    NewRelationship, RelationshipFilter, SqliteRelationshipRepository,
};
use crate::repo::traversal::{Direction, GraphData, RelatedQuery, SqliteTraversalQueries};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::fs;
use std::sync::Arc;

/// Public data-access service over one storage root.
///
/// Owns the connection pool and the project registry; all methods take
/// `&mut self`, which serializes use within a process.
pub struct GraphService {
    registry: ProjectRegistry,
    pool: ConnectionPool,
}

impl GraphService {
    /// Opens the service over the configured storage root.
    ///
    /// # Errors
    /// Returns an error only when the storage root cannot be created;
    /// per-project stores open lazily on first use.
    pub fn open(config: &StoreConfig) -> Result<Self, DbError> {
        fs::create_dir_all(&config.storage_root)?;
        Ok(Self {
            registry: ProjectRegistry::new(&config.storage_root),
            pool: ConnectionPool::new(&config.storage_root)
                .with_windows(config.fresh_window, config.stale_window),
        })
    }

    /// Opens the service with an injected pool clock (deterministic
    /// freshness behavior in tests).
    pub fn open_with_clock(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, DbError> {
        fs::create_dir_all(&config.storage_root)?;
        Ok(Self {
            registry: ProjectRegistry::new(&config.storage_root),
            pool: ConnectionPool::with_clock(&config.storage_root, clock)
                .with_windows(config.fresh_window, config.stale_window),
        })
    }

    /// Drops every cached store connection.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }

    // ---- projects -------------------------------------------------------

    /// Lists all known projects. Failure degrades to an empty list.
    pub fn list_projects(&mut self) -> Vec<Project> {
        match self.registry.list() {
            Ok(projects) => projects,
            Err(err) => {
                error!("event=project_list module=service status=error error={err}");
                Vec::new()
            }
        }
    }

    /// Creates a project; `None` when the name is blank or already taken
    /// case-insensitively.
    pub fn create_project(&mut self, name: &str, description: &str) -> Option<Project> {
        if let Err(err) = require_non_blank(name, "name") {
            warn!("event=project_create module=service status=error error={err}");
            return None;
        }
        match self.registry.create(name, description) {
            Ok(Some(project)) => {
                info!(
                    "event=project_create module=service status=ok project={}",
                    project.id
                );
                Some(project)
            }
            Ok(None) => {
                debug!("event=project_create module=service status=name_taken name={name}");
                None
            }
            Err(err) => {
                error!("event=project_create module=service status=error error={err}");
                None
            }
        }
    }

    /// Gets a project by id.
    pub fn get_project(&mut self, project_id: &str) -> Option<Project> {
        match self.registry.get(project_id) {
            Ok(project) => project,
            Err(err) => {
                error!(
                    "event=project_get module=service status=error project={project_id} error={err}"
                );
                None
            }
        }
    }

    /// Gets a project by id or, failing that, by case-insensitive name.
    pub fn get_project_by_name_or_id(&mut self, identifier: &str) -> Option<Project> {
        match self.registry.get_by_name_or_id(identifier) {
            Ok(project) => project,
            Err(err) => {
                error!(
                    "event=project_get module=service status=error identifier={identifier} error={err}"
                );
                None
            }
        }
    }

    /// Deletes a project, its cached connection and its whole storage
    /// location. Returns `false` when the id is unknown.
    pub fn delete_project(&mut self, project_id: &str) -> bool {
        let project = match self.registry.get(project_id) {
            Ok(Some(project)) => project,
            Ok(None) => return false,
            Err(err) => {
                error!(
                    "event=project_delete module=service status=error project={project_id} error={err}"
                );
                return false;
            }
        };

        match self.registry.delete(project_id) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(err) => {
                error!(
                    "event=project_delete module=service status=error project={project_id} error={err}"
                );
                return false;
            }
        }

        self.pool.evict(project_id);
        if let Err(err) = fs::remove_dir_all(&project.storage_location) {
            if err.kind() != std::io::ErrorKind::NotFound {
                error!(
                    "event=project_delete module=service status=error project={project_id} error={err}"
                );
            }
        }
        info!("event=project_delete module=service status=ok project={project_id}");
        true
    }

    // ---- entities -------------------------------------------------------

    /// Creates an entity with optional initial observations.
    ///
    /// The result carries the post-commit verification status; an
    /// unverified create is still a success.
    pub fn create_entity(&mut self, project_id: &str, draft: &NewEntity) -> Option<CreatedEntity> {
        let conn = self.project_connection("entity_create", project_id)?;
        let result =
            SqliteEntityRepository::try_new(conn).and_then(|mut repo| repo.create_entity(draft));
        match result {
            Ok(created) => {
                if created.verification == VerificationStatus::Unverified {
                    warn!(
                        "event=entity_create module=service status=unverified project={} entity={}",
                        project_id, created.entity.id
                    );
                }
                info!(
                    "event=entity_create module=service status=ok project={} entity={}",
                    project_id, created.entity.id
                );
                Some(created)
            }
            Err(err) => {
                error!(
                    "event=entity_create module=service status=error project={project_id} error={err}"
                );
                None
            }
        }
    }

    /// Gets one entity by id.
    pub fn get_entity(&mut self, project_id: &str, entity_id: &str) -> Option<Entity> {
        let conn = self.project_connection("entity_get", project_id)?;
        let result = SqliteEntityRepository::try_new(conn).and_then(|repo| repo.get_entity(entity_id));
        match result {
            Ok(entity) => entity,
            Err(err) => {
                error!(
                    "event=entity_get module=service status=error project={project_id} entity={entity_id} error={err}"
                );
                None
            }
        }
    }

    /// Lists every entity in the project. Failure degrades to empty.
    pub fn get_all_entities(&mut self, project_id: &str) -> Vec<Entity> {
        let Some(conn) = self.project_connection("entity_list", project_id) else {
            return Vec::new();
        };
        let result = SqliteEntityRepository::try_new(conn).and_then(|repo| repo.list_entities());
        match result {
            Ok(entities) => entities,
            Err(err) => {
                error!(
                    "event=entity_list module=service status=error project={project_id} error={err}"
                );
                Vec::new()
            }
        }
    }

    /// Applies a partial field update and returns the updated entity.
    pub fn update_entity(
        &mut self,
        project_id: &str,
        entity_id: &str,
        update: &EntityUpdate,
    ) -> Option<Entity> {
        let conn = self.project_connection("entity_update", project_id)?;
        let result = SqliteEntityRepository::try_new(conn)
            .and_then(|mut repo| repo.update_entity(entity_id, update));
        match result {
            Ok(entity) => {
                info!(
                    "event=entity_update module=service status=ok project={project_id} entity={entity_id}"
                );
                Some(entity)
            }
            Err(GraphRepoError::NotFound(_)) => None,
            Err(err) => {
                error!(
                    "event=entity_update module=service status=error project={project_id} entity={entity_id} error={err}"
                );
                None
            }
        }
    }

    /// Replaces an entity's description.
    pub fn update_entity_description(
        &mut self,
        project_id: &str,
        entity_id: &str,
        text: &str,
    ) -> bool {
        let Some(conn) = self.project_connection("entity_describe", project_id) else {
            return false;
        };
        let result = SqliteEntityRepository::try_new(conn)
            .and_then(|mut repo| repo.update_description(entity_id, text));
        match result {
            Ok(()) => true,
            Err(GraphRepoError::NotFound(_)) => false,
            Err(err) => {
                error!(
                    "event=entity_describe module=service status=error project={project_id} entity={entity_id} error={err}"
                );
                false
            }
        }
    }

    /// Deletes an entity and all incident relationships atomically.
    pub fn delete_entity(&mut self, project_id: &str, entity_id: &str) -> bool {
        let Some(conn) = self.project_connection("entity_delete", project_id) else {
            return false;
        };
        let result = SqliteEntityRepository::try_new(conn)
            .and_then(|mut repo| repo.delete_entity(entity_id));
        match result {
            Ok(()) => {
                info!(
                    "event=entity_delete module=service status=ok project={project_id} entity={entity_id}"
                );
                true
            }
            Err(GraphRepoError::NotFound(_)) => false,
            Err(err) => {
                error!(
                    "event=entity_delete module=service status=error project={project_id} entity={entity_id} error={err}"
                );
                false
            }
        }
    }

    // ---- observations ---------------------------------------------------

    /// Appends an observation to an entity and returns the created record.
    pub fn add_observation(
        &mut self,
        project_id: &str,
        entity_id: &str,
        text: &str,
    ) -> Option<Observation> {
        let conn = self.project_connection("observation_add", project_id)?;
        let result = SqliteEntityRepository::try_new(conn)
            .and_then(|mut repo| repo.add_observation(entity_id, text));
        match result {
            Ok(observation) => Some(observation),
            Err(GraphRepoError::NotFound(_)) => None,
            Err(err @ GraphRepoError::ObservationConflict(_)) => {
                warn!(
                    "event=observation_add module=service status=conflict project={project_id} entity={entity_id} error={err}"
                );
                None
            }
            Err(err) => {
                error!(
                    "event=observation_add module=service status=error project={project_id} entity={entity_id} error={err}"
                );
                None
            }
        }
    }

    /// Removes one observation by id. `false` when the entity or the
    /// observation is absent, or when a concurrent writer won.
    pub fn delete_observation(
        &mut self,
        project_id: &str,
        entity_id: &str,
        observation_id: &str,
    ) -> bool {
        let Some(conn) = self.project_connection("observation_delete", project_id) else {
            return false;
        };
        let result = SqliteEntityRepository::try_new(conn)
            .and_then(|mut repo| repo.delete_observation(entity_id, observation_id));
        match result {
            Ok(removed) => removed,
            Err(GraphRepoError::NotFound(_)) => false,
            Err(err @ GraphRepoError::ObservationConflict(_)) => {
                warn!(
                    "event=observation_delete module=service status=conflict project={project_id} entity={entity_id} error={err}"
                );
                false
            }
            Err(err) => {
                error!(
                    "event=observation_delete module=service status=error project={project_id} entity={entity_id} error={err}"
                );
                false
            }
        }
    }

    // ---- relationships --------------------------------------------------

    /// Creates a directed, typed relationship between two existing
    /// entities.
    pub fn create_relationship(
        &mut self,
        project_id: &str,
        draft: &NewRelationship,
    ) -> Option<Relationship> {
        let conn = self.project_connection("relationship_create", project_id)?;
        let result = SqliteRelationshipRepository::try_new(conn)
            .and_then(|mut repo| repo.create_relationship(draft));
        match result {
            Ok(relationship) => {
                info!(
                    "event=relationship_create module=service status=ok project={} relationship={}",
                    project_id, relationship.id
                );
                Some(relationship)
            }
            Err(err) => {
                error!(
                    "event=relationship_create module=service status=error project={project_id} error={err}"
                );
                None
            }
        }
    }

    /// Deletes one relationship by id (the primary, unambiguous path).
    pub fn delete_relationship(&mut self, project_id: &str, relationship_id: &str) -> bool {
        let Some(conn) = self.project_connection("relationship_delete", project_id) else {
            return false;
        };
        let result = SqliteRelationshipRepository::try_new(conn)
            .and_then(|mut repo| repo.delete_relationship(relationship_id));
        match result {
            Ok(removed) => removed,
            Err(err) => {
                error!(
                    "event=relationship_delete module=service status=error project={project_id} relationship={relationship_id} error={err}"
                );
                false
            }
        }
    }

    /// Deletes every relationship matching the `(from, to, type)` triple.
    pub fn delete_relationship_by_endpoints(
        &mut self,
        project_id: &str,
        from_id: &str,
        to_id: &str,
        kind: &str,
    ) -> bool {
        let Some(conn) = self.project_connection("relationship_delete", project_id) else {
            return false;
        };
        let result = SqliteRelationshipRepository::try_new(conn)
            .and_then(|mut repo| repo.delete_relationship_by_endpoints(from_id, to_id, kind));
        match result {
            Ok(removed) => removed,
            Err(err) => {
                error!(
                    "event=relationship_delete module=service status=error project={project_id} from={from_id} to={to_id} error={err}"
                );
                false
            }
        }
    }

    /// Lists relationships matching the filter. Failure degrades to empty.
    pub fn get_relationships(
        &mut self,
        project_id: &str,
        filter: &RelationshipFilter,
    ) -> Vec<Relationship> {
        let Some(conn) = self.project_connection("relationship_list", project_id) else {
            return Vec::new();
        };
        let result = SqliteRelationshipRepository::try_new(conn)
            .and_then(|repo| repo.list_relationships(filter));
        match result {
            Ok(relationships) => relationships,
            Err(err) => {
                error!(
                    "event=relationship_list module=service status=error project={project_id} error={err}"
                );
                Vec::new()
            }
        }
    }

    // ---- traversal ------------------------------------------------------

    /// Returns entities related to the origin, following edges in the
    /// given direction with an optional type filter.
    pub fn get_related_entities(
        &mut self,
        project_id: &str,
        entity_id: &str,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Vec<Entity> {
        let Some(conn) = self.project_connection("related_entities", project_id) else {
            return Vec::new();
        };
        let query = RelatedQuery {
            entity_id: entity_id.to_string(),
            rel_type: rel_type.map(str::to_string),
            direction,
        };
        let result =
            SqliteTraversalQueries::try_new(conn).and_then(|queries| queries.related_entities(&query));
        match result {
            Ok(entities) => entities,
            Err(err) => {
                error!(
                    "event=related_entities module=service status=error project={project_id} entity={entity_id} error={err}"
                );
                Vec::new()
            }
        }
    }

    /// Returns the project's full node and edge set. Failure degrades to
    /// an empty snapshot.
    pub fn get_graph_data(&mut self, project_id: &str) -> GraphData {
        let Some(conn) = self.project_connection("graph_data", project_id) else {
            return GraphData::default();
        };
        let result = SqliteTraversalQueries::try_new(conn).and_then(|queries| queries.graph_data());
        match result {
            Ok(data) => data,
            Err(err) => {
                error!(
                    "event=graph_data module=service status=error project={project_id} error={err}"
                );
                GraphData::default()
            }
        }
    }

    fn project_connection(&mut self, op: &'static str, project_id: &str) -> Option<&mut Connection> {
        match self.pool.connection(project_id) {
            Ok(conn) => Some(conn),
            Err(err) => {
                error!("event={op} module=service status=error project={project_id} error={err}");
                None
            }
        }
    }
}
