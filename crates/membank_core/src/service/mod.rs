//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate registry, pool and repository calls into the public
//!   data-access surface.
//! - Act as the error boundary: no storage error escapes to callers.

pub mod graph_service;
