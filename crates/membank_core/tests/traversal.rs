use membank_core::db::open_graph_db_in_memory;
use membank_core::{
    Direction, NewEntity, NewRelationship, RelatedQuery, SqliteEntityRepository,
    SqliteRelationshipRepository, SqliteTraversalQueries,
};
use rusqlite::Connection;

fn entity(conn: &mut Connection, name: &str, kind: &str) -> String {
    let mut repo = SqliteEntityRepository::try_new(conn).unwrap();
    repo.create_entity(&NewEntity {
        name: name.to_string(),
        kind: kind.to_string(),
        description: format!("{name} description"),
        ..NewEntity::default()
    })
    .unwrap()
    .entity
    .id
}

fn relate(conn: &mut Connection, from_id: &str, to_id: &str, kind: &str) {
    let mut repo = SqliteRelationshipRepository::try_new(conn).unwrap();
    repo.create_relationship(&NewRelationship {
        from_id: from_id.to_string(),
        to_id: to_id.to_string(),
        kind: kind.to_string(),
    })
    .unwrap();
}

fn related_names(
    conn: &Connection,
    entity_id: &str,
    rel_type: Option<&str>,
    direction: Direction,
) -> Vec<String> {
    let queries = SqliteTraversalQueries::try_new(conn).unwrap();
    queries
        .related_entities(&RelatedQuery {
            entity_id: entity_id.to_string(),
            rel_type: rel_type.map(str::to_string),
            direction,
        })
        .unwrap()
        .into_iter()
        .map(|entity| entity.name)
        .collect()
}

#[test]
fn outgoing_and_incoming_follow_edge_direction() {
    let mut conn = open_graph_db_in_memory().unwrap();
    let login = entity(&mut conn, "Login", "feature");
    let auth = entity(&mut conn, "AuthService", "component");
    relate(&mut conn, &login, &auth, "depends_on");

    assert_eq!(
        related_names(&conn, &login, Some("depends_on"), Direction::Outgoing),
        vec!["AuthService"]
    );
    assert_eq!(
        related_names(&conn, &auth, Some("depends_on"), Direction::Incoming),
        vec!["Login"]
    );
    assert!(related_names(&conn, &login, Some("depends_on"), Direction::Incoming).is_empty());
    assert!(related_names(&conn, &auth, Some("depends_on"), Direction::Outgoing).is_empty());
}

#[test]
fn both_direction_sees_neighbors_on_either_side() {
    let mut conn = open_graph_db_in_memory().unwrap();
    let login = entity(&mut conn, "Login", "feature");
    let auth = entity(&mut conn, "AuthService", "component");
    let session = entity(&mut conn, "SessionStore", "component");
    relate(&mut conn, &login, &auth, "depends_on");
    relate(&mut conn, &session, &login, "feeds");

    let names = related_names(&conn, &login, None, Direction::Both);
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"AuthService".to_string()));
    assert!(names.contains(&"SessionStore".to_string()));
}

#[test]
fn both_direction_never_returns_the_origin_itself() {
    let mut conn = open_graph_db_in_memory().unwrap();
    let login = entity(&mut conn, "Login", "feature");
    let auth = entity(&mut conn, "AuthService", "component");
    relate(&mut conn, &login, &login, "references");
    relate(&mut conn, &login, &auth, "depends_on");

    let names = related_names(&conn, &login, None, Direction::Both);
    assert_eq!(names, vec!["AuthService"]);
}

#[test]
fn parallel_edges_deduplicate_to_one_neighbor() {
    let mut conn = open_graph_db_in_memory().unwrap();
    let login = entity(&mut conn, "Login", "feature");
    let auth = entity(&mut conn, "AuthService", "component");
    relate(&mut conn, &login, &auth, "depends_on");
    relate(&mut conn, &login, &auth, "depends_on");
    relate(&mut conn, &auth, &login, "serves");

    let names = related_names(&conn, &login, None, Direction::Both);
    assert_eq!(names, vec!["AuthService"]);
}

#[test]
fn type_filter_narrows_the_edge_pattern() {
    let mut conn = open_graph_db_in_memory().unwrap();
    let login = entity(&mut conn, "Login", "feature");
    let auth = entity(&mut conn, "AuthService", "component");
    let session = entity(&mut conn, "SessionStore", "component");
    relate(&mut conn, &login, &auth, "depends_on");
    relate(&mut conn, &login, &session, "mentions");

    assert_eq!(
        related_names(&conn, &login, Some("depends_on"), Direction::Outgoing),
        vec!["AuthService"]
    );
    assert_eq!(
        related_names(&conn, &login, Some("mentions"), Direction::Outgoing),
        vec!["SessionStore"]
    );
}

#[test]
fn graph_data_returns_full_node_and_edge_sets() {
    let mut conn = open_graph_db_in_memory().unwrap();
    let login = entity(&mut conn, "Login", "feature");
    let auth = entity(&mut conn, "AuthService", "component");
    relate(&mut conn, &login, &auth, "depends_on");

    let queries = SqliteTraversalQueries::try_new(&conn).unwrap();
    let data = queries.graph_data().unwrap();
    assert_eq!(data.nodes.len(), 2);
    assert_eq!(data.links.len(), 1);
    assert_eq!(data.links[0].kind, "depends_on");
    assert_eq!(data.links[0].from_id, login);
    assert_eq!(data.links[0].to_id, auth);
}

#[test]
fn corrupt_neighbor_blob_degrades_to_empty_observations() {
    let mut conn = open_graph_db_in_memory().unwrap();
    let login = entity(&mut conn, "Login", "feature");
    let auth = entity(&mut conn, "AuthService", "component");
    relate(&mut conn, &login, &auth, "depends_on");

    conn.execute(
        "UPDATE entities SET observations = '{broken' WHERE id = ?1;",
        [auth.as_str()],
    )
    .unwrap();

    let queries = SqliteTraversalQueries::try_new(&conn).unwrap();
    let related = queries
        .related_entities(&RelatedQuery {
            entity_id: login.clone(),
            rel_type: None,
            direction: Direction::Outgoing,
        })
        .unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].name, "AuthService");
    assert!(related[0].observations.is_empty());
}
