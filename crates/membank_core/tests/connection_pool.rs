use membank_core::{Clock, ConnectionPool, NewEntity, SqliteEntityRepository};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Deterministic clock for freshness-window tests.
struct ManualClock {
    base: Instant,
    offset_ms: AtomicU64,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    fn advance(&self, delta: Duration) {
        self.offset_ms
            .fetch_add(delta.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

fn pool_with_clock(root: &std::path::Path) -> (ConnectionPool, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let pool = ConnectionPool::with_clock(root, clock.clone());
    (pool, clock)
}

#[test]
fn calls_within_the_fresh_window_reuse_the_cached_handle() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pool, clock) = pool_with_clock(dir.path());

    pool.connection("alpha").unwrap();
    clock.advance(Duration::from_secs(4 * 60));
    pool.connection("alpha").unwrap();

    let stats = pool.stats();
    assert_eq!(stats.lifetime_opens, 1);
    assert_eq!(stats.cached, 1);
}

#[test]
fn a_call_after_the_fresh_window_opens_a_new_handle() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pool, clock) = pool_with_clock(dir.path());

    pool.connection("alpha").unwrap();
    clock.advance(Duration::from_secs(6 * 60));
    pool.connection("alpha").unwrap();

    assert_eq!(pool.stats().lifetime_opens, 2);
}

#[test]
fn fresh_hits_keep_extending_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pool, clock) = pool_with_clock(dir.path());

    pool.connection("alpha").unwrap();
    for _ in 0..3 {
        clock.advance(Duration::from_secs(4 * 60));
        pool.connection("alpha").unwrap();
    }

    // Each hit touched last_accessed, so no reopen ever happened.
    assert_eq!(pool.stats().lifetime_opens, 1);
}

#[test]
fn stale_entries_are_swept_before_a_new_open() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pool, clock) = pool_with_clock(dir.path());

    pool.connection("alpha").unwrap();
    clock.advance(Duration::from_secs(11 * 60));
    pool.connection("beta").unwrap();

    let stats = pool.stats();
    assert_eq!(stats.cached, 1, "stale alpha handle should be gone");
    assert_eq!(stats.lifetime_opens, 2);
}

#[test]
fn entries_between_fresh_and_stale_survive_other_projects_opens() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pool, clock) = pool_with_clock(dir.path());

    pool.connection("alpha").unwrap();
    clock.advance(Duration::from_secs(7 * 60));
    pool.connection("beta").unwrap();

    // alpha is older than fresh but younger than stale: still cached.
    assert_eq!(pool.stats().cached, 2);
}

#[test]
fn schema_setup_runs_once_per_path_and_data_survives_eviction() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pool, _clock) = pool_with_clock(dir.path());

    let entity_id = {
        let conn = pool.connection("alpha").unwrap();
        let mut repo = SqliteEntityRepository::try_new(conn).unwrap();
        repo.create_entity(&NewEntity {
            name: "Login".to_string(),
            kind: "feature".to_string(),
            description: "login flow".to_string(),
            ..NewEntity::default()
        })
        .unwrap()
        .entity
        .id
    };

    pool.evict("alpha");
    assert_eq!(pool.stats().cached, 0);

    // Reopen on the same path: setup guard skips migrations, data is intact.
    let conn = pool.connection("alpha").unwrap();
    let repo = SqliteEntityRepository::try_new(conn).unwrap();
    let loaded = repo.get_entity(&entity_id).unwrap().unwrap();
    assert_eq!(loaded.name, "Login");
}

#[test]
fn projects_are_isolated_by_storage_path() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pool, _clock) = pool_with_clock(dir.path());

    let entity_id = {
        let conn = pool.connection("alpha").unwrap();
        let mut repo = SqliteEntityRepository::try_new(conn).unwrap();
        repo.create_entity(&NewEntity {
            name: "OnlyInAlpha".to_string(),
            kind: "feature".to_string(),
            description: "alpha data".to_string(),
            ..NewEntity::default()
        })
        .unwrap()
        .entity
        .id
    };

    let conn = pool.connection("beta").unwrap();
    let repo = SqliteEntityRepository::try_new(conn).unwrap();
    assert!(repo.get_entity(&entity_id).unwrap().is_none());
}

#[test]
fn shutdown_drops_all_cached_handles() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pool, _clock) = pool_with_clock(dir.path());

    pool.connection("alpha").unwrap();
    pool.connection("beta").unwrap();
    assert_eq!(pool.stats().cached, 2);

    pool.shutdown();
    assert_eq!(pool.stats().cached, 0);

    // The pool remains usable after shutdown.
    pool.connection("alpha").unwrap();
    assert_eq!(pool.stats().cached, 1);
}

#[test]
fn database_path_is_deterministic_per_project() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, _clock) = pool_with_clock(dir.path());

    let path = pool.database_path("alpha");
    assert!(path.starts_with(dir.path()));
    assert!(path.ends_with("projects/alpha/graph.db"));
}
