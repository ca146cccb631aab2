//! Per-project connection cache with freshness windows.
//!
//! # Responsibility
//! - Resolve a project id to a ready-to-use store connection.
//! - Reuse fresh connections, sweep stale ones, and run schema setup at
//!   most once per storage path per process.
//!
//! # Invariants
//! - A cached connection younger than the fresh window is returned as-is.
//! - Entries older than the stale window are dropped before any new open.
//! - Eviction only drops the handle; SQLite finalizes on drop, so no other
//!   cleanup is performed.

use crate::db::open::{open_graph_db, open_graph_db_prepared};
use crate::db::DbResult;
use log::info;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Age under which a cached connection is reused without reopening.
pub const FRESH_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Age beyond which a cached connection is swept on the next open.
pub const STALE_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Directory under the storage root holding per-project stores.
pub const PROJECTS_DIR: &str = "projects";

const GRAPH_DB_FILE: &str = "graph.db";

/// Time source for freshness decisions, injectable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default wall-clock source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Counters describing pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently cached.
    pub cached: usize,
    /// Physical store opens since the pool was created.
    pub lifetime_opens: u64,
}

struct PoolEntry {
    conn: Connection,
    last_accessed: Instant,
}

/// Explicit per-project connection cache owned by the caller.
///
/// Not shareable across threads; one pool serves one logical consumer and
/// `&mut self` access serializes all use.
pub struct ConnectionPool {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    fresh_window: Duration,
    stale_window: Duration,
    entries: HashMap<String, PoolEntry>,
    prepared_paths: HashSet<PathBuf>,
    lifetime_opens: u64,
}

impl ConnectionPool {
    /// Creates a pool over the given storage root with the default clock
    /// and windows.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    /// Creates a pool with an injected time source.
    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
            fresh_window: FRESH_WINDOW,
            stale_window: STALE_WINDOW,
            entries: HashMap::new(),
            prepared_paths: HashSet::new(),
            lifetime_opens: 0,
        }
    }

    /// Overrides the freshness/staleness windows.
    pub fn with_windows(mut self, fresh_window: Duration, stale_window: Duration) -> Self {
        self.fresh_window = fresh_window;
        self.stale_window = stale_window;
        self
    }

    /// Deterministic store path for a project id.
    pub fn database_path(&self, project_id: &str) -> PathBuf {
        self.root.join(PROJECTS_DIR).join(project_id).join(GRAPH_DB_FILE)
    }

    /// Resolves a ready connection for the project, reusing a fresh cached
    /// handle or opening a new one.
    ///
    /// # Errors
    /// Returns the open/bootstrap/schema error when a new handle cannot be
    /// established. Schema setup failure is fatal to the open.
    pub fn connection(&mut self, project_id: &str) -> DbResult<&mut Connection> {
        let now = self.clock.now();
        let fresh = self
            .entries
            .get(project_id)
            .map(|entry| now.duration_since(entry.last_accessed) < self.fresh_window)
            .unwrap_or(false);

        if fresh {
            let entry = self
                .entries
                .get_mut(project_id)
                .expect("freshness check guarantees the entry is present");
            entry.last_accessed = now;
            return Ok(&mut entry.conn);
        }

        self.entries.remove(project_id);
        self.sweep_stale(now);

        let path = self.database_path(project_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let run_setup = !self.prepared_paths.contains(&path);
        let conn = if run_setup {
            open_graph_db(&path)?
        } else {
            open_graph_db_prepared(&path)?
        };
        self.prepared_paths.insert(path);
        self.lifetime_opens += 1;
        info!(
            "event=pool_open module=db status=ok project={} setup={}",
            project_id, run_setup
        );

        let entry = self
            .entries
            .entry(project_id.to_string())
            .or_insert(PoolEntry {
                conn,
                last_accessed: now,
            });
        Ok(&mut entry.conn)
    }

    /// Drops the cached connection for a project, if any.
    pub fn evict(&mut self, project_id: &str) {
        if self.entries.remove(project_id).is_some() {
            info!("event=pool_evict module=db status=ok project={project_id}");
        }
    }

    /// Drops every cached connection. The setup guard survives shutdown;
    /// the schema itself is persistent.
    pub fn shutdown(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        info!("event=pool_shutdown module=db status=ok dropped={dropped}");
    }

    /// Returns activity counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            cached: self.entries.len(),
            lifetime_opens: self.lifetime_opens,
        }
    }

    fn sweep_stale(&mut self, now: Instant) {
        let stale_window = self.stale_window;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_accessed) <= stale_window);
        let swept = before - self.entries.len();
        if swept > 0 {
            info!("event=pool_sweep module=db status=ok swept={swept}");
        }
    }
}
