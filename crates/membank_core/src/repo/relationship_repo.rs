//! Relationship repository: transactional edge mutations and filtered
//! lists.
//!
//! # Responsibility
//! - Own edge creation/deletion under the shared write protocol.
//! - Keep endpoint-existence enforcement inside the persistence boundary.
//!
//! # Invariants
//! - Edge creation succeeds only when both endpoint entities exist; the
//!   store's constraint check is the enforcement point.
//! - Deletion by id is the primary, unambiguous path; deletion by
//!   `(from, to, type)` removes every matching edge.

use crate::db::checkpoint_passive;
use crate::model::epoch_ms_now;
use crate::model::relationship::Relationship;
use crate::repo::entity_repo::{
    ensure_graph_connection_ready, GraphRepoError, GraphRepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};

const RELATIONSHIP_SELECT_SQL: &str = "SELECT
    id,
    from_id,
    to_id,
    type,
    created_at
FROM relationships";

/// Request model for relationship creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRelationship {
    pub from_id: String,
    pub to_id: String,
    pub kind: String,
}

/// Filter options for relationship listing. Empty filter lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipFilter {
    pub from_id: Option<String>,
    pub to_id: Option<String>,
    pub kind: Option<String>,
}

/// SQLite-backed relationship repository.
pub struct SqliteRelationshipRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteRelationshipRepository<'conn> {
    /// Constructs a repository from a bootstrapped, schema-ready
    /// connection.
    pub fn try_new(conn: &'conn mut Connection) -> GraphRepoResult<Self> {
        ensure_graph_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Creates a directed, typed edge between two existing entities.
    ///
    /// # Contract
    /// - Fails with `EndpointMissing` when either endpoint is absent.
    /// - The returned relationship is constructed from the inputs, not
    ///   re-read.
    pub fn create_relationship(
        &mut self,
        draft: &NewRelationship,
    ) -> GraphRepoResult<Relationship> {
        let relationship = Relationship::new(
            draft.from_id.clone(),
            draft.to_id.clone(),
            draft.kind.clone(),
            epoch_ms_now(),
        );
        relationship.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT INTO relationships (id, from_id, to_id, type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                relationship.id,
                relationship.from_id,
                relationship.to_id,
                relationship.kind,
                relationship.created_at,
            ],
        );
        if let Err(err) = inserted {
            drop(tx);
            if is_constraint_violation(&err) {
                return Err(GraphRepoError::EndpointMissing {
                    from_id: draft.from_id.clone(),
                    to_id: draft.to_id.clone(),
                });
            }
            return Err(err.into());
        }
        tx.commit()?;
        checkpoint_passive(self.conn);
        Ok(relationship)
    }

    /// Deletes one edge by id. Returns `false` when the id is unknown.
    pub fn delete_relationship(&mut self, relationship_id: &str) -> GraphRepoResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "DELETE FROM relationships WHERE id = ?1;",
            [relationship_id],
        )?;
        tx.commit()?;
        checkpoint_passive(self.conn);
        Ok(changed > 0)
    }

    /// Deletes every edge matching the `(from, to, type)` triple.
    /// Returns `false` when nothing matched.
    pub fn delete_relationship_by_endpoints(
        &mut self,
        from_id: &str,
        to_id: &str,
        kind: &str,
    ) -> GraphRepoResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "DELETE FROM relationships
             WHERE from_id = ?1 AND to_id = ?2 AND type = ?3;",
            params![from_id, to_id, kind],
        )?;
        tx.commit()?;
        checkpoint_passive(self.conn);
        Ok(changed > 0)
    }

    /// Lists edges matching the filter, oldest first.
    pub fn list_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> GraphRepoResult<Vec<Relationship>> {
        let mut sql = format!("{RELATIONSHIP_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(from_id) = filter.from_id.as_ref() {
            sql.push_str(" AND from_id = ?");
            bind_values.push(Value::Text(from_id.clone()));
        }
        if let Some(to_id) = filter.to_id.as_ref() {
            sql.push_str(" AND to_id = ?");
            bind_values.push(Value::Text(to_id.clone()));
        }
        if let Some(kind) = filter.kind.as_ref() {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(kind.clone()));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut relationships = Vec::new();
        while let Some(row) = rows.next()? {
            relationships.push(parse_relationship_row(row)?);
        }
        Ok(relationships)
    }
}

pub(crate) fn parse_relationship_row(row: &Row<'_>) -> GraphRepoResult<Relationship> {
    Ok(Relationship {
        id: row.get("id")?,
        from_id: row.get("from_id")?,
        to_id: row.get("to_id")?,
        kind: row.get("type")?,
        created_at: row.get("created_at")?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
