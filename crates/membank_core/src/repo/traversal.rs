//! Traversal query layer: direction-aware related-entity lookups and
//! whole-graph snapshots.
//!
//! # Responsibility
//! - Compile `{direction, type filter}` variants into one parameterized
//!   statement per lookup.
//! - Decode result rows through the entity model with local recovery.
//!
//! # Invariants
//! - The undirected (`Both`) pattern never returns the origin entity
//!   itself, so self-loops cannot surface as "related to itself".
//! - Result sets are deduplicated by the other endpoint's id.
//! - A decode failure on one row degrades that row's observations to an
//!   empty list instead of failing the whole query.

use crate::model::entity::{Entity, EntityId};
use crate::model::relationship::Relationship;
use crate::repo::entity_repo::{
    ensure_graph_connection_ready, parse_entity_row, GraphRepoResult,
};
use crate::repo::relationship_repo::parse_relationship_row;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

const RELATED_SELECT_SQL: &str = "SELECT DISTINCT
    e.id AS id,
    e.name AS name,
    e.type AS type,
    e.description AS description,
    e.observations AS observations,
    e.parent_id AS parent_id,
    e.created_at AS created_at,
    e.updated_at AS updated_at
FROM relationships r";

/// Which edges to follow from the origin entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Follow `origin -> other` edges only.
    Outgoing,
    /// Follow `other -> origin` edges only.
    Incoming,
    /// Follow edges in either direction.
    #[default]
    Both,
}

/// One related-entities lookup, compiled to a parameterized statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedQuery {
    pub entity_id: EntityId,
    /// Optional edge-type narrowing.
    pub rel_type: Option<String>,
    pub direction: Direction,
}

impl RelatedQuery {
    /// Compiles this query into SQL plus its bind values.
    ///
    /// All user-supplied values travel through binds; direction only
    /// selects between fixed statement shapes.
    fn compile(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(RELATED_SELECT_SQL);
        match self.direction {
            Direction::Outgoing => {
                sql.push_str(
                    "
 INNER JOIN entities e ON e.id = r.to_id
 WHERE r.from_id = ?1",
                );
            }
            Direction::Incoming => {
                sql.push_str(
                    "
 INNER JOIN entities e ON e.id = r.from_id
 WHERE r.to_id = ?1",
                );
            }
            Direction::Both => {
                sql.push_str(
                    "
 INNER JOIN entities e
    ON e.id = CASE WHEN r.from_id = ?1 THEN r.to_id ELSE r.from_id END
 WHERE (r.from_id = ?1 OR r.to_id = ?1)
   AND e.id <> ?1",
                );
            }
        }

        let mut bind_values = vec![Value::Text(self.entity_id.clone())];
        if let Some(rel_type) = self.rel_type.as_ref() {
            sql.push_str(" AND r.type = ?2");
            bind_values.push(Value::Text(rel_type.clone()));
        }
        sql.push_str("\n ORDER BY e.name ASC, e.id ASC;");
        (sql, bind_values)
    }
}

/// Full node and edge snapshot of one project store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphData {
    pub nodes: Vec<Entity>,
    pub links: Vec<Relationship>,
}

/// Read-only traversal queries over a schema-ready connection.
pub struct SqliteTraversalQueries<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTraversalQueries<'conn> {
    /// Constructs the query layer from a bootstrapped, schema-ready
    /// connection.
    pub fn try_new(conn: &'conn Connection) -> GraphRepoResult<Self> {
        ensure_graph_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Returns the entities related to the origin under the query's
    /// direction and optional type filter.
    pub fn related_entities(&self, query: &RelatedQuery) -> GraphRepoResult<Vec<Entity>> {
        let (sql, bind_values) = query.compile();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }
        Ok(entities)
    }

    /// Returns the full node and edge set. No pagination; callers cap
    /// rows where they need to.
    pub fn graph_data(&self) -> GraphRepoResult<GraphData> {
        let mut nodes = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                name,
                type,
                description,
                observations,
                parent_id,
                created_at,
                updated_at
             FROM entities
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            nodes.push(parse_entity_row(row)?);
        }

        let mut links = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                from_id,
                to_id,
                type,
                created_at
             FROM relationships
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            links.push(parse_relationship_row(row)?);
        }

        Ok(GraphData { nodes, links })
    }
}
