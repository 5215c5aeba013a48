//! # hktracker - Hollow Knight 112% completion tracker
//!
//! Turns the community markdown checklist into a queryable catalog and
//! serves it over HTTP.
//!
//! hktracker provides:
//! - A checklist parser for pipe-delimited markdown tables
//! - SQLite-backed storage for the item catalog and play sessions
//! - Filtered item queries and completion statistics
//! - Session grouping with an open/saved lifecycle
//! - A read-only SQL console

pub mod item;
pub mod parser;
pub mod storage;
pub mod query;
pub mod server;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use item::{ChecklistEntry, Item, ItemFilter};
pub use storage::Catalog;
pub use query::{CompletionStats, GroupBy, GroupStats, SessionDetail, SessionSummary};

/// Result type alias for hktracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for hktracker operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    StateConflict(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Query error: {0}")]
    Execution(String),

    #[error("Catalog already initialized with {0} items")]
    IngestionConflict(usize),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn item_not_found(id: i64) -> Self {
        Error::NotFound(format!("Item {}", id))
    }

    pub(crate) fn session_not_found(id: i64) -> Self {
        Error::NotFound(format!("Session {}", id))
    }

    pub(crate) fn saved_session(id: i64) -> Self {
        Error::StateConflict(format!("Cannot modify saved session {}", id))
    }
}
