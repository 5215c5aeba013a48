//! Database schema definitions

/// Columns selected for an item, in `row_to_item` order
pub const ITEM_COLUMNS: &str = "id, found, name, category, region, information, location_url";

/// SQL to create the items table
pub const CREATE_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY,
    found INTEGER NOT NULL DEFAULT 0,
    name TEXT NOT NULL CHECK (length(name) > 0),
    category TEXT NOT NULL,
    region TEXT NOT NULL,
    information TEXT NOT NULL DEFAULT '',
    location_url TEXT
)
"#;

/// SQL to create the sessions table
/// AUTOINCREMENT keeps the id counter inside SQLite, so ids are never reused
pub const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    saved_at TEXT
)
"#;

/// SQL to create the session_items table (session <-> item membership)
pub const CREATE_SESSION_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS session_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL,
    item_id INTEGER NOT NULL,
    added_at TEXT NOT NULL,
    UNIQUE(session_id, item_id)
)
"#;

/// Item indexes, rebuilt whenever the items table is recreated
pub const CREATE_ITEM_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_items_region ON items(region)",
    "CREATE INDEX IF NOT EXISTS idx_items_category ON items(category)",
    "CREATE INDEX IF NOT EXISTS idx_items_found ON items(found)",
];

pub const CREATE_SESSION_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_session_items_session ON session_items(session_id)",
];

pub const DROP_ITEMS_TABLE: &str = "DROP TABLE IF EXISTS items";

/// Statements that (re)create the items table
pub fn item_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_ITEMS_TABLE];
    stmts.extend(CREATE_ITEM_INDEXES.iter().copied());
    stmts
}

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = item_schema_statements();
    stmts.push(CREATE_SESSIONS_TABLE);
    stmts.push(CREATE_SESSION_ITEMS_TABLE);
    stmts.extend(CREATE_SESSION_INDEXES.iter().copied());
    stmts
}
