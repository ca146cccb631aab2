//! Repository layer: transactional graph persistence and queries.
//!
//! # Responsibility
//! - Define the write protocol shared by every graph mutation: immediate
//!   transaction, parameterized statements, commit, advisory checkpoint,
//!   optimistic result construction.
//! - Isolate SQL and blob-codec details from service orchestration.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Repository APIs return semantic errors (`NotFound`, conflict) in
//!   addition to storage transport errors; sentinel conversion happens at
//!   the service boundary, not here.

pub mod entity_repo;
pub mod relationship_repo;
pub mod traversal;
