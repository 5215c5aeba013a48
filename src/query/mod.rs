//! Query layer over the catalog
//!
//! - `stats`: completion aggregates, overall and grouped
//! - `session`: play-session grouping with an open/saved lifecycle
//! - `console`: the read-only SQL console

pub mod console;
pub mod session;
pub mod stats;

pub use console::{ConsoleResult, validate_select};
pub use session::{Session, SessionDetail, SessionItem, SessionState, SessionSummary};
pub use stats::{CompletionStats, GroupBy, GroupStats, completion_percent};
