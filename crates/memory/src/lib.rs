//! Observation storage for mnemo.
//!
//! The SQLite store owns the durable tables and the FTS5 relevance
//! index kept in sync with them.

pub mod rows;
pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;
