//! Play sessions - named groupings of catalog items
//!
//! A session starts OPEN (`saved_at` is null) and becomes SAVED once
//! `save_session` stamps it. Saved sessions reject membership changes but
//! can still be deleted.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::{Deserialize, Serialize};

use crate::item::Item;
use crate::storage::Catalog;
use crate::storage::sqlite::{fetch_item, row_to_item};
use crate::{Error, Result};

/// Lifecycle state, derived from `saved_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Saved,
}

/// Session header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn state(&self) -> SessionState {
        match self.saved_at {
            Some(_) => SessionState::Saved,
            None => SessionState::Open,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.state() == SessionState::Saved
    }

    /// Name used when none is supplied at creation
    pub fn default_name(id: i64) -> String {
        format!("Session {}", id)
    }
}

/// Session header with its member count, as listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: Session,
    pub item_count: usize,
}

/// A member item with the time it joined the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionItem {
    #[serde(flatten)]
    pub item: Item,
    pub added_at: DateTime<Utc>,
}

/// Session header with its members in the order they were added
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    pub items: Vec<SessionItem>,
    pub item_count: usize,
}

impl Catalog {
    /// Create an open session; blank names fall back to "Session {id}"
    pub fn create_session(&self, name: Option<&str>) -> Result<SessionSummary> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let created_at = Utc::now();

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO sessions (name, created_at) VALUES (?1, ?2)",
            params![name.unwrap_or_default(), created_at],
        )?;
        let id = tx.last_insert_rowid();

        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let name = Session::default_name(id);
                tx.execute("UPDATE sessions SET name = ?1 WHERE id = ?2", params![name, id])?;
                name
            }
        };
        tx.commit()?;

        tracing::info!("Created session {} ({})", id, name);
        Ok(SessionSummary {
            session: Session { id, name, created_at, saved_at: None },
            item_count: 0,
        })
    }

    /// Get a session with its member items
    pub fn get_session(&self, id: i64) -> Result<SessionDetail> {
        let conn = self.connect()?;
        let session = require_session(&conn, id)?;
        load_detail(&conn, session)
    }

    /// All sessions, most recently created first
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.id, s.name, s.created_at, s.saved_at,
                   (SELECT COUNT(*)
                    FROM session_items si
                    JOIN items h ON si.item_id = h.id
                    WHERE si.session_id = s.id)
            FROM sessions s
            ORDER BY s.created_at DESC, s.id DESC
            "#,
        )?;

        let sessions = stmt
            .query_map([], |row| {
                let count: i64 = row.get(4)?;
                Ok(SessionSummary {
                    session: row_to_session(row)?,
                    item_count: count as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    /// Add a catalog item to an open session
    pub fn add_session_item(&self, session_id: i64, item_id: i64) -> Result<SessionDetail> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let session = require_open(&tx, session_id)?;
        if fetch_item(&tx, item_id)?.is_none() {
            return Err(Error::item_not_found(item_id));
        }
        if membership_exists(&tx, session_id, item_id)? {
            return Err(Error::StateConflict(format!(
                "Item {} already in session {}",
                item_id, session_id
            )));
        }

        tx.execute(
            "INSERT INTO session_items (session_id, item_id, added_at) VALUES (?1, ?2, ?3)",
            params![session_id, item_id, Utc::now()],
        )?;
        let detail = load_detail(&tx, session)?;
        tx.commit()?;

        tracing::debug!("Added item {} to session {}", item_id, session_id);
        Ok(detail)
    }

    /// Remove one item from an open session
    pub fn remove_session_item(&self, session_id: i64, item_id: i64) -> Result<SessionDetail> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let session = require_open(&tx, session_id)?;
        if !membership_exists(&tx, session_id, item_id)? {
            return Err(Error::NotFound(format!(
                "Item {} in session {}",
                item_id, session_id
            )));
        }

        tx.execute(
            "DELETE FROM session_items WHERE session_id = ?1 AND item_id = ?2",
            params![session_id, item_id],
        )?;
        let detail = load_detail(&tx, session)?;
        tx.commit()?;

        tracing::debug!("Removed item {} from session {}", item_id, session_id);
        Ok(detail)
    }

    /// Remove every item from an open session
    pub fn clear_session(&self, session_id: i64) -> Result<SessionDetail> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let session = require_open(&tx, session_id)?;
        let removed = tx.execute("DELETE FROM session_items WHERE session_id = ?1", [session_id])?;
        let detail = load_detail(&tx, session)?;
        tx.commit()?;

        tracing::debug!("Cleared {} items from session {}", removed, session_id);
        Ok(detail)
    }

    /// Stamp `saved_at`, freezing membership.
    ///
    /// Saving an already saved session moves the timestamp forward.
    pub fn save_session(&self, session_id: i64) -> Result<SessionDetail> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut session = require_session(&tx, session_id)?;
        let saved_at = Utc::now();
        tx.execute(
            "UPDATE sessions SET saved_at = ?1 WHERE id = ?2",
            params![saved_at, session_id],
        )?;
        session.saved_at = Some(saved_at);
        let detail = load_detail(&tx, session)?;
        tx.commit()?;

        tracing::info!("Saved session {} with {} items", session_id, detail.item_count);
        Ok(detail)
    }

    /// Delete a session and its memberships, whatever its state
    pub fn delete_session(&self, session_id: i64) -> Result<i64> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        require_session(&tx, session_id)?;
        tx.execute("DELETE FROM session_items WHERE session_id = ?1", [session_id])?;
        tx.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;
        tx.commit()?;

        tracing::info!("Deleted session {}", session_id);
        Ok(session_id)
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        saved_at: row.get(3)?,
    })
}

fn fetch_session(conn: &Connection, id: i64) -> Result<Option<Session>> {
    conn.query_row(
        "SELECT id, name, created_at, saved_at FROM sessions WHERE id = ?1",
        [id],
        row_to_session,
    )
    .optional()
    .map_err(Into::into)
}

fn require_session(conn: &Connection, id: i64) -> Result<Session> {
    fetch_session(conn, id)?.ok_or_else(|| Error::session_not_found(id))
}

fn require_open(conn: &Connection, id: i64) -> Result<Session> {
    let session = require_session(conn, id)?;
    if session.is_saved() {
        return Err(Error::saved_session(id));
    }
    Ok(session)
}

fn membership_exists(conn: &Connection, session_id: i64, item_id: i64) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM session_items WHERE session_id = ?1 AND item_id = ?2",
            [session_id, item_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn load_detail(conn: &Connection, session: Session) -> Result<SessionDetail> {
    let mut stmt = conn.prepare(
        r#"
        SELECT h.id, h.found, h.name, h.category, h.region, h.information, h.location_url,
               si.added_at
        FROM session_items si
        JOIN items h ON si.item_id = h.id
        WHERE si.session_id = ?1
        ORDER BY si.added_at, si.id
        "#,
    )?;

    let items = stmt
        .query_map([session.id], |row| {
            Ok(SessionItem {
                item: row_to_item(row)?,
                added_at: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(SessionDetail {
        item_count: items.len(),
        items,
        session,
    })
}
