//! Connection bootstrap utilities for the graph store.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Run schema setup before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` (relationship endpoint
//!   enforcement and cascade deletes depend on it).
//! - File-backed connections run in WAL mode so post-commit checkpoints
//!   are meaningful.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info, warn};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a graph store file, bootstraps the connection and runs schema
/// setup.
///
/// # Side effects
/// - Emits `store_open` logging events with duration and status.
pub fn open_graph_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_store(path.as_ref(), true)
}

/// Opens a graph store file whose schema setup already ran earlier in this
/// process (connection bootstrap only).
///
/// Callers are responsible for the "setup ran for this exact path" guard;
/// the schema statements themselves are existence-checked, so a mistaken
/// call to [`open_graph_db`] instead is safe, just slower.
pub(crate) fn open_graph_db_prepared(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_store(path.as_ref(), false)
}

/// Opens an in-memory graph store with schema setup applied.
///
/// Used by tests and callers that need a throwaway store.
pub fn open_graph_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=store_open module=db status=start mode=memory");

    let mut conn = match Connection::open_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode=memory duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, false, true) {
        Ok(()) => {
            info!(
                "event=store_open module=db status=ok mode=memory duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode=memory duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Issues the advisory post-commit durability flush.
///
/// Failure is logged at warn level and never propagated; the preceding
/// commit remains authoritative.
pub fn checkpoint_passive(conn: &Connection) {
    let result = conn.query_row("PRAGMA wal_checkpoint(PASSIVE);", [], |_| Ok(()));
    if let Err(err) = result {
        warn!("event=wal_checkpoint module=db status=error error={err}");
    }
}

fn open_store(path: &Path, run_setup: bool) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=store_open module=db status=start mode=file setup={}",
        run_setup
    );

    let mut conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode=file duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, true, run_setup) {
        Ok(()) => {
            info!(
                "event=store_open module=db status=ok mode=file duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode=file duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, file_backed: bool, run_setup: bool) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if file_backed {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }
    if run_setup {
        apply_migrations(conn)?;
    }
    Ok(())
}
