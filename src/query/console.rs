//! Read-only SQL console
//!
//! Two layers keep the console from writing:
//! - `validate_select`: the statement must start with SELECT and must not
//!   contain a write/DDL keyword as a standalone token
//! - execution goes through a connection opened with SQLITE_OPEN_READ_ONLY
//!
//! The keyword scan is a heuristic. It rejects keywords inside string
//! literals too, and the read-only connection is what actually stops writes.

use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};

use crate::storage::Catalog;
use crate::{Error, Result};

/// Keywords that may not appear anywhere in a console query
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
];

/// Columns and rows returned by a console query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

/// Check a console query against the SELECT-only policy
pub fn validate_select(sql: &str) -> Result<()> {
    let first_word = sql.split_whitespace().next().unwrap_or("");
    if !first_word.eq_ignore_ascii_case("SELECT") {
        return Err(Error::Rejected(
            "Only SELECT queries are allowed. Write operations are not permitted through the SQL console."
                .to_string(),
        ));
    }

    // Anything that can't be part of an identifier separates tokens, so
    // `1;DROP` splits the same way `1; DROP` does
    let tokens: Vec<&str> = sql
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect();

    for keyword in FORBIDDEN_KEYWORDS {
        if tokens.iter().any(|t| t.eq_ignore_ascii_case(keyword)) {
            return Err(Error::Rejected(format!(
                "Query contains forbidden keyword: {}",
                keyword
            )));
        }
    }

    Ok(())
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => serde_json::Value::from(bytes.to_vec()),
    }
}

fn execution(e: rusqlite::Error) -> Error {
    Error::Execution(e.to_string())
}

impl Catalog {
    /// Validate and run a console query against a read-only connection
    pub fn run_select(&self, sql: &str) -> Result<ConsoleResult> {
        let sql = sql.trim();
        if let Err(e) = validate_select(sql) {
            tracing::warn!("Rejected console query: {}", e);
            return Err(e);
        }

        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(sql).map_err(execution)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([]).map_err(execution)?;
        while let Some(row) = cursor.next().map_err(execution)? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(value_to_json(row.get_ref(idx).map_err(execution)?));
            }
            rows.push(values);
        }

        tracing::debug!("Console query returned {} rows", rows.len());
        Ok(ConsoleResult {
            columns,
            row_count: rows.len(),
            rows,
        })
    }
}
