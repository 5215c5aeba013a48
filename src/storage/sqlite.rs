//! SQLite storage implementation

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior, params, params_from_iter};

use super::schema;
use crate::item::{ChecklistEntry, Item, ItemFilter};
use crate::query::GroupBy;
use crate::{Error, Result};

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the SQLite-backed catalog.
///
/// Cheap to clone; holds no open connection between operations.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
}

impl Catalog {
    /// Open a database file (creates it and the schema if missing)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let catalog = Self { path: path.to_path_buf() };
        let conn = catalog.connect()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Opened catalog at {} (journal_mode={})", path.display(), mode);
        catalog.initialize_schema(&conn)?;
        Ok(catalog)
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a read-write connection for one operation
    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Open a connection that SQLite itself refuses to write through
    pub(crate) fn connect_read_only(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Initialize the database schema
    fn initialize_schema(&self, conn: &Connection) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Ingestion ==========

    /// Load parsed entries into an empty catalog.
    ///
    /// Ids are assigned in entry order starting at 1. Fails with
    /// `IngestionConflict` without touching anything if items already exist.
    pub fn initialize(&self, entries: &[ChecklistEntry]) -> Result<usize> {
        let items = to_items(entries)?;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = count_items(&tx)?;
        if existing > 0 {
            return Err(Error::IngestionConflict(existing));
        }

        insert_items(&tx, &items)?;
        tx.commit()?;

        tracing::info!("Initialized catalog with {} items", items.len());
        Ok(items.len())
    }

    /// Drop and rebuild the items table from fresh entries.
    ///
    /// Ids are reassigned from 1, so every session membership is removed in
    /// the same transaction. Sessions themselves are kept, empty.
    pub fn reinitialize(&self, entries: &[ChecklistEntry]) -> Result<usize> {
        let items = to_items(entries)?;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let detached = tx.execute("DELETE FROM session_items", [])?;
        if detached > 0 {
            tracing::warn!("Removed {} session memberships before reloading items", detached);
        }
        tx.execute(schema::DROP_ITEMS_TABLE, [])?;
        for stmt in schema::item_schema_statements() {
            tx.execute(stmt, [])?;
        }
        insert_items(&tx, &items)?;
        tx.commit()?;

        tracing::info!("Reinitialized catalog with {} items", items.len());
        Ok(items.len())
    }

    /// Whether the catalog holds any items
    pub fn is_initialized(&self) -> Result<bool> {
        let conn = self.connect()?;
        Ok(count_items(&conn)? > 0)
    }

    /// Count all items
    pub fn count_items(&self) -> Result<usize> {
        let conn = self.connect()?;
        count_items(&conn)
    }

    // ========== Item Operations ==========

    /// List items matching a filter, ordered by id
    pub fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        let mut sql = format!("SELECT {} FROM items WHERE 1=1", schema::ITEM_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let Some(found) = filter.found {
            sql.push_str(" AND found = ?");
            values.push(Value::Integer(found as i64));
        }
        if let Some(category) = &filter.category {
            sql.push_str(" AND category = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(region) = &filter.region {
            sql.push_str(" AND region = ?");
            values.push(Value::Text(region.clone()));
        }
        sql.push_str(" ORDER BY id");

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values), row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // SQLite's LOWER() only folds ASCII, so the name match happens here
        Ok(items
            .into_iter()
            .filter(|item| filter.matches_name(&item.name))
            .collect())
    }

    /// Get an item by id
    pub fn get_item(&self, id: i64) -> Result<Item> {
        let conn = self.connect()?;
        fetch_item(&conn, id)?.ok_or_else(|| Error::item_not_found(id))
    }

    /// Set the found flag of an item and return the updated record
    pub fn set_found(&self, id: i64, found: bool) -> Result<Item> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if fetch_item(&tx, id)?.is_none() {
            return Err(Error::item_not_found(id));
        }

        tx.execute("UPDATE items SET found = ?1 WHERE id = ?2", params![found, id])?;
        let item = fetch_item(&tx, id)?.ok_or_else(|| Error::item_not_found(id))?;
        tx.commit()?;

        tracing::debug!("Item {} ({}) found={}", id, item.name, found);
        Ok(item)
    }

    /// Distinct categories, sorted
    pub fn categories(&self) -> Result<Vec<String>> {
        self.distinct_values(GroupBy::Category)
    }

    /// Distinct regions, sorted
    pub fn regions(&self) -> Result<Vec<String>> {
        self.distinct_values(GroupBy::Region)
    }

    fn distinct_values(&self, column: GroupBy) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {col} FROM items WHERE {col} IS NOT NULL ORDER BY {col}",
            col = column.column()
        );

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(values)
    }
}

/// Validate entries and assign ids before any SQL runs
fn to_items(entries: &[ChecklistEntry]) -> Result<Vec<Item>> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| Item::from_entry(idx as i64 + 1, entry))
        .collect()
}

fn insert_items(conn: &Connection, items: &[Item]) -> Result<()> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO items (id, found, name, category, region, information, location_url)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )?;

    for item in items {
        stmt.execute(params![
            item.id,
            item.found,
            item.name,
            item.category,
            item.region,
            item.information,
            item.location_url,
        ])?;
    }
    Ok(())
}

fn count_items(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
    Ok(count as usize)
}

pub(crate) fn fetch_item(conn: &Connection, id: i64) -> Result<Option<Item>> {
    conn.query_row(
        &format!("SELECT {} FROM items WHERE id = ?1", schema::ITEM_COLUMNS),
        [id],
        row_to_item,
    )
    .optional()
    .map_err(Into::into)
}

/// Helper to convert a row to an Item
pub(crate) fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        found: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        region: row.get(4)?,
        information: row.get(5)?,
        location_url: row.get(6)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn sample_entries() -> Vec<ChecklistEntry> {
        vec![
            ChecklistEntry::new("Vengeful Spirit", "Spell", "Forgotten Crossroads").with_found(true),
            ChecklistEntry::new("Mothwing Cloak", "Equipment", "Greenpath"),
            ChecklistEntry::new("Hornet", "Boss", "Greenpath")
                .with_found(true)
                .with_location_url("https://example.com/hornet"),
            ChecklistEntry::new("Thorns of Agony", "Charm", "Greenpath")
                .with_information("Behind the thorn maze"),
            ChecklistEntry::new("Desolate Dive", "Spell", "City of Tears"),
        ]
    }

    pub(crate) fn open_temp() -> (TempDir, Catalog) {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open(&dir.path().join("db").join("catalog.db")).unwrap();
        (dir, catalog)
    }

    pub(crate) fn loaded_catalog() -> (TempDir, Catalog) {
        let (dir, catalog) = open_temp();
        catalog.initialize(&sample_entries()).unwrap();
        (dir, catalog)
    }

    #[test]
    fn test_initialize_assigns_sequential_ids() {
        let (_dir, catalog) = open_temp();
        assert!(!catalog.is_initialized().unwrap());

        assert_eq!(catalog.initialize(&sample_entries()).unwrap(), 5);
        assert!(catalog.is_initialized().unwrap());

        let items = catalog.list_items(&ItemFilter::new()).unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(items[0].name, "Vengeful Spirit");
        assert_eq!(items[2].location_url.as_deref(), Some("https://example.com/hornet"));
    }

    #[test]
    fn test_initialize_twice_conflicts() {
        let (_dir, catalog) = loaded_catalog();
        let err = catalog.initialize(&sample_entries()).unwrap_err();
        assert!(matches!(err, Error::IngestionConflict(5)));
        assert_eq!(catalog.count_items().unwrap(), 5);
    }

    #[test]
    fn test_initialize_rejects_nameless_entry_without_loading() {
        let (_dir, catalog) = open_temp();
        let mut entries = sample_entries();
        entries.push(ChecklistEntry::new("", "Charm", "Greenpath"));

        assert!(matches!(catalog.initialize(&entries), Err(Error::InvalidRecord(_))));
        assert_eq!(catalog.count_items().unwrap(), 0);
    }

    #[test]
    fn test_reinitialize_replaces_items() {
        let (_dir, catalog) = loaded_catalog();
        catalog.set_found(2, true).unwrap();

        let fresh = vec![ChecklistEntry::new("Grubsong", "Charm", "Crystal Peak")];
        assert_eq!(catalog.reinitialize(&fresh).unwrap(), 1);

        let items = catalog.list_items(&ItemFilter::new()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[0].name, "Grubsong");
        assert_eq!(catalog.regions().unwrap(), vec!["Crystal Peak"]);
    }

    #[test]
    fn test_reinitialize_empties_sessions() {
        let (_dir, catalog) = loaded_catalog();
        let id = catalog.create_session(Some("before reload")).unwrap().session.id;
        catalog.add_session_item(id, 1).unwrap();
        catalog.add_session_item(id, 5).unwrap();

        let fresh = vec![ChecklistEntry::new("Grubsong", "Charm", "Crystal Peak")];
        catalog.reinitialize(&fresh).unwrap();

        let detail = catalog.get_session(id).unwrap();
        assert!(detail.items.is_empty());
        assert_eq!(detail.session.name, "before reload");

        let sessions = catalog.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].item_count, detail.item_count);

        let readded = catalog.add_session_item(id, 1).unwrap();
        assert_eq!(readded.items[0].item.name, "Grubsong");
    }

    #[test]
    fn test_list_items_filters_combine() {
        let (_dir, catalog) = loaded_catalog();

        let greenpath = catalog.list_items(&ItemFilter::new().region("Greenpath")).unwrap();
        assert_eq!(greenpath.len(), 3);

        let found_in_greenpath = catalog
            .list_items(&ItemFilter::new().region("Greenpath").found(true))
            .unwrap();
        assert_eq!(found_in_greenpath.len(), 1);
        assert_eq!(found_in_greenpath[0].name, "Hornet");

        let spells = catalog.list_items(&ItemFilter::new().category("Spell").found(false)).unwrap();
        assert_eq!(spells.len(), 1);
        assert_eq!(spells[0].name, "Desolate Dive");

        let none = catalog.list_items(&ItemFilter::new().category("spell")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_list_items_name_substring() {
        let (_dir, catalog) = loaded_catalog();
        let items = catalog.list_items(&ItemFilter::new().name("OF")).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Thorns of Agony"]);

        // LIKE wildcards are plain characters here
        assert!(catalog.list_items(&ItemFilter::new().name("%")).unwrap().is_empty());
    }

    #[test]
    fn test_get_item_not_found() {
        let (_dir, catalog) = loaded_catalog();
        assert_eq!(catalog.get_item(4).unwrap().information, "Behind the thorn maze");
        assert!(matches!(catalog.get_item(99), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_set_found_is_idempotent() {
        let (_dir, catalog) = loaded_catalog();

        let first = catalog.set_found(2, true).unwrap();
        let second = catalog.set_found(2, true).unwrap();
        assert!(first.found);
        assert_eq!(first, second);
        assert_eq!(catalog.get_item(2).unwrap(), second);

        let cleared = catalog.set_found(2, false).unwrap();
        assert!(!cleared.found);
        assert_eq!(cleared.name, "Mothwing Cloak");
    }

    #[test]
    fn test_set_found_unknown_item() {
        let (_dir, catalog) = loaded_catalog();
        assert!(matches!(catalog.set_found(42, true), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_distinct_values_sorted() {
        let (_dir, catalog) = loaded_catalog();
        assert_eq!(catalog.categories().unwrap(), vec!["Boss", "Charm", "Equipment", "Spell"]);
        assert_eq!(
            catalog.regions().unwrap(),
            vec!["City of Tears", "Forgotten Crossroads", "Greenpath"]
        );
    }

    #[test]
    fn test_parsed_document_round_trip() {
        let doc = "\
| Found | Location | Name | Category | Region |
|---|---|---|---|---|
| **X** | [](http://x) | Vengeful Spirit | Spell | Distant Village |
| | | [Grubfather](http://g) | **NPC** | Forgotten Crossroads |
| | | Mantis Lords | Boss | Fungal Wastes |
| | | Mantis Claw | Equipment | Fungal Wastes |
";
        let entries = crate::parser::parse(doc);
        let (_dir, catalog) = open_temp();
        catalog.initialize(&entries).unwrap();

        let mut expected: Vec<String> = entries.iter().map(|e| e.region.clone()).collect();
        expected.sort();
        expected.dedup();
        assert_eq!(catalog.regions().unwrap(), expected);
        assert_eq!(catalog.categories().unwrap(), vec!["Boss", "Equipment", "NPC", "Spell"]);
    }
}
