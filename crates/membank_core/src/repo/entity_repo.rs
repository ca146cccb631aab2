//! Entity repository: transactional mutations, observation blob writes and
//! point/list reads.
//!
//! # Responsibility
//! - Own the transactional write protocol for entities and observations.
//! - Keep SQL details and the observation codec inside the persistence
//!   boundary.
//!
//! # Invariants
//! - Every write runs inside one immediate transaction and issues an
//!   advisory checkpoint after a successful commit.
//! - Success results are constructed from inputs/known state, never by
//!   re-reading committed rows.
//! - Observation writes are conditional on `observations_version`; a stale
//!   writer is rejected instead of silently overwriting.

use crate::db::migrations::latest_version;
use crate::db::{checkpoint_passive, DbError};
use crate::model::entity::{
    decode_observations, encode_observations, Entity, EntityId, Observation,
};
use crate::model::{epoch_ms_now, ValidationError};
use log::{error, warn};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::thread;
use std::time::Duration;

const ENTITY_SELECT_SQL: &str = "SELECT
    id,
    name,
    type,
    description,
    observations,
    parent_id,
    created_at,
    updated_at
FROM entities";

/// Post-commit verification schedule: bounded point lookups with linearly
/// increasing delays.
const VERIFY_DELAYS_MS: [u64; 3] = [0, 100, 200];

pub type GraphRepoResult<T> = Result<T, GraphRepoError>;

/// Repository error for graph persistence and query operations.
#[derive(Debug)]
pub enum GraphRepoError {
    /// Record failed model validation before any SQL ran.
    Validation(ValidationError),
    /// Underlying storage/bootstrap error.
    Db(DbError),
    /// Target entity does not exist.
    NotFound(EntityId),
    /// Conditional observation write lost to a concurrent writer.
    ObservationConflict(EntityId),
    /// Relationship endpoints do not both exist.
    EndpointMissing { from_id: EntityId, to_id: EntityId },
    /// Observation list could not be encoded for persistence.
    Codec(serde_json::Error),
    /// Connection schema is not at the expected version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing from the connected store.
    MissingRequiredTable(&'static str),
}

impl Display for GraphRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "entity not found: {id}"),
            Self::ObservationConflict(id) => {
                write!(f, "observation list changed concurrently for entity {id}")
            }
            Self::EndpointMissing { from_id, to_id } => write!(
                f,
                "relationship endpoints must both exist: from={from_id} to={to_id}"
            ),
            Self::Codec(err) => write!(f, "observation codec failure: {err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "graph repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "graph repository requires table `{table}`")
            }
        }
    }
}

impl Error for GraphRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for GraphRepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for GraphRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GraphRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for GraphRepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value)
    }
}

/// Outcome of the bounded post-commit read-back check.
///
/// Commit success is authoritative: an unverified create is still a
/// success, and the status exists so callers can decide to re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// The committed row became visible to a point lookup.
    Verified,
    /// No read-back attempt saw the row; logged, never fatal.
    Unverified,
}

/// Result of a successful entity creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEntity {
    pub entity: Entity,
    pub verification: VerificationStatus,
}

/// Request model for entity creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEntity {
    pub name: String,
    pub kind: String,
    pub description: String,
    /// Initial observation texts; each receives a fresh id.
    pub observations: Vec<String>,
    pub parent_id: Option<EntityId>,
}

/// Partial field update for an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` clears the parent link; `None` leaves it unchanged.
    pub parent_id: Option<Option<EntityId>>,
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Constructs a repository from a bootstrapped, schema-ready
    /// connection.
    pub fn try_new(conn: &'conn mut Connection) -> GraphRepoResult<Self> {
        ensure_graph_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Creates an entity and runs bounded post-commit verification.
    ///
    /// # Contract
    /// - The returned entity is constructed from the inputs, not re-read.
    /// - Verification failure downgrades `verification`, never the result.
    pub fn create_entity(&mut self, draft: &NewEntity) -> GraphRepoResult<CreatedEntity> {
        let now = epoch_ms_now();
        let mut entity = Entity::new(
            draft.name.clone(),
            draft.kind.clone(),
            draft.description.clone(),
            now,
        );
        entity.parent_id = draft.parent_id.clone();
        entity.observations = draft
            .observations
            .iter()
            .map(|text| Observation::new(text.clone(), now))
            .collect();
        entity.validate()?;

        let blob = encode_observations(&entity.observations)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO entities (
                id,
                name,
                type,
                description,
                observations,
                observations_version,
                parent_id,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7);",
            params![
                entity.id,
                entity.name,
                entity.kind,
                entity.description,
                blob,
                entity.parent_id.as_deref(),
                now,
            ],
        )?;
        tx.commit()?;
        checkpoint_passive(self.conn);

        let verification = self.verify_created(&entity.id);
        Ok(CreatedEntity {
            entity,
            verification,
        })
    }

    /// Applies a partial field update and returns the updated entity.
    ///
    /// Observations are untouched by this path; their version stamp is
    /// owned by the observation write protocol.
    pub fn update_entity(
        &mut self,
        entity_id: &str,
        update: &EntityUpdate,
    ) -> GraphRepoResult<Entity> {
        let now = epoch_ms_now();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut entity = match load_entity(&tx, entity_id)? {
            Some(entity) => entity,
            None => return Err(GraphRepoError::NotFound(entity_id.to_string())),
        };

        if let Some(name) = &update.name {
            entity.name = name.clone();
        }
        if let Some(kind) = &update.kind {
            entity.kind = kind.clone();
        }
        if let Some(description) = &update.description {
            entity.description = description.clone();
        }
        if let Some(parent_id) = &update.parent_id {
            entity.parent_id = parent_id.clone();
        }
        entity.updated_at = now;
        entity.validate()?;

        tx.execute(
            "UPDATE entities
             SET
                name = ?2,
                type = ?3,
                description = ?4,
                parent_id = ?5,
                updated_at = ?6
             WHERE id = ?1;",
            params![
                entity_id,
                entity.name,
                entity.kind,
                entity.description,
                entity.parent_id.as_deref(),
                now,
            ],
        )?;
        tx.commit()?;
        checkpoint_passive(self.conn);
        Ok(entity)
    }

    /// Replaces only the description field.
    pub fn update_description(&mut self, entity_id: &str, text: &str) -> GraphRepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE entities
             SET description = ?2, updated_at = ?3
             WHERE id = ?1;",
            params![entity_id, text, epoch_ms_now()],
        )?;
        if changed == 0 {
            return Err(GraphRepoError::NotFound(entity_id.to_string()));
        }
        tx.commit()?;
        checkpoint_passive(self.conn);
        Ok(())
    }

    /// Deletes an entity and, through the cascade constraint, every
    /// incident relationship in the same statement.
    pub fn delete_entity(&mut self, entity_id: &str) -> GraphRepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute("DELETE FROM entities WHERE id = ?1;", [entity_id])?;
        if changed == 0 {
            return Err(GraphRepoError::NotFound(entity_id.to_string()));
        }
        tx.commit()?;
        checkpoint_passive(self.conn);
        Ok(())
    }

    /// Gets one entity by id.
    pub fn get_entity(&self, entity_id: &str) -> GraphRepoResult<Option<Entity>> {
        load_entity(self.conn, entity_id)
    }

    /// Lists every entity in the store, most recently updated first.
    pub fn list_entities(&self) -> GraphRepoResult<Vec<Entity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTITY_SELECT_SQL} ORDER BY updated_at DESC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }
        Ok(entities)
    }

    /// Reads the current observation list and its version stamp.
    ///
    /// An unparsable blob is recovered as an empty list with a warning;
    /// the next conditional write re-encodes a valid blob.
    pub fn read_observations(
        &self,
        entity_id: &str,
    ) -> GraphRepoResult<Option<(Vec<Observation>, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT observations, observations_version
             FROM entities
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([entity_id])?;
        if let Some(row) = rows.next()? {
            let raw: String = row.get("observations")?;
            let version: i64 = row.get("observations_version")?;
            return Ok(Some((recover_observations(entity_id, &raw), version)));
        }
        Ok(None)
    }

    /// Writes a full observation list back, conditional on the version
    /// stamp read alongside it.
    ///
    /// # Errors
    /// - `ObservationConflict` when the stamp moved since the read.
    /// - `NotFound` when the entity vanished since the read.
    pub fn write_observations(
        &mut self,
        entity_id: &str,
        expected_version: i64,
        observations: &[Observation],
    ) -> GraphRepoResult<()> {
        let blob = encode_observations(observations)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE entities
             SET
                observations = ?2,
                observations_version = ?3,
                updated_at = ?4
             WHERE id = ?1
               AND observations_version = ?5;",
            params![
                entity_id,
                blob,
                expected_version + 1,
                epoch_ms_now(),
                expected_version,
            ],
        )?;
        if changed == 0 {
            drop(tx);
            if entity_exists(self.conn, entity_id)? {
                return Err(GraphRepoError::ObservationConflict(entity_id.to_string()));
            }
            return Err(GraphRepoError::NotFound(entity_id.to_string()));
        }
        tx.commit()?;
        checkpoint_passive(self.conn);
        Ok(())
    }

    /// Appends one observation via the conditional read-modify-write
    /// protocol and returns the created record.
    pub fn add_observation(
        &mut self,
        entity_id: &str,
        text: &str,
    ) -> GraphRepoResult<Observation> {
        let (mut observations, version) = match self.read_observations(entity_id)? {
            Some(state) => state,
            None => return Err(GraphRepoError::NotFound(entity_id.to_string())),
        };
        let observation = Observation::new(text, epoch_ms_now());
        observations.push(observation.clone());
        self.write_observations(entity_id, version, &observations)?;
        Ok(observation)
    }

    /// Removes one observation by id.
    ///
    /// Returns `Ok(false)` without opening a transaction when the id is
    /// not present in the decoded list.
    pub fn delete_observation(
        &mut self,
        entity_id: &str,
        observation_id: &str,
    ) -> GraphRepoResult<bool> {
        let (observations, version) = match self.read_observations(entity_id)? {
            Some(state) => state,
            None => return Err(GraphRepoError::NotFound(entity_id.to_string())),
        };
        if !observations.iter().any(|obs| obs.id == observation_id) {
            return Ok(false);
        }
        let remaining: Vec<Observation> = observations
            .into_iter()
            .filter(|obs| obs.id != observation_id)
            .collect();
        self.write_observations(entity_id, version, &remaining)?;
        Ok(true)
    }

    fn verify_created(&self, entity_id: &str) -> VerificationStatus {
        for (attempt, delay_ms) in VERIFY_DELAYS_MS.iter().enumerate() {
            if *delay_ms > 0 {
                thread::sleep(Duration::from_millis(*delay_ms));
            }
            match entity_exists(self.conn, entity_id) {
                Ok(true) => return VerificationStatus::Verified,
                Ok(false) => {}
                Err(err) => warn!(
                    "event=entity_verify module=repo status=error attempt={} entity={} error={}",
                    attempt + 1,
                    entity_id,
                    err
                ),
            }
        }
        error!("event=entity_verify module=repo status=unverified entity={entity_id}");
        VerificationStatus::Unverified
    }
}

/// Checks that the connection carries the expected graph schema.
pub(crate) fn ensure_graph_connection_ready(conn: &Connection) -> GraphRepoResult<()> {
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(GraphRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["entities", "relationships"] {
        if !table_exists(conn, table)? {
            return Err(GraphRepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

pub(crate) fn load_entity(conn: &Connection, entity_id: &str) -> GraphRepoResult<Option<Entity>> {
    let mut stmt = conn.prepare(&format!("{ENTITY_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([entity_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_entity_row(row)?));
    }
    Ok(None)
}

pub(crate) fn parse_entity_row(row: &Row<'_>) -> GraphRepoResult<Entity> {
    let id: String = row.get("id")?;
    let raw_observations: String = row.get("observations")?;
    let observations = recover_observations(&id, &raw_observations);
    Ok(Entity {
        name: row.get("name")?,
        kind: row.get("type")?,
        description: row.get("description")?,
        observations,
        parent_id: row.get("parent_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        id,
    })
}

/// Decodes an observation blob, substituting an empty list on failure.
fn recover_observations(entity_id: &str, raw: &str) -> Vec<Observation> {
    match decode_observations(raw) {
        Ok(list) => list,
        Err(err) => {
            warn!(
                "event=observation_decode module=repo status=error entity={entity_id} error={err}"
            );
            Vec::new()
        }
    }
}

pub(crate) fn entity_exists(conn: &Connection, entity_id: &str) -> GraphRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM entities
            WHERE id = ?1
        );",
        [entity_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_exists(conn: &Connection, table: &str) -> GraphRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
