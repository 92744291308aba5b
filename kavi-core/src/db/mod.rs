//! Database layer for kavi
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - Append-only history logs read back by the context, personality and
//!   proactive components

pub mod repo;
pub mod schema;

pub use repo::Database;
