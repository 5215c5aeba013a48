//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - items(id, found, name, category, region, information, location_url)
//! - sessions(id, name, created_at, saved_at)
//! - session_items(session_id, item_id, added_at)
//!
//! The `Catalog` handle only remembers where the database lives. Every
//! operation opens its own connection and drops it before returning.

pub mod schema;
pub mod sqlite;

pub use sqlite::Catalog;
