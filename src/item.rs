//! Item types - the checklist catalog records
//!
//! A checklist row goes through two shapes:
//! - `ChecklistEntry`: what the parser emits, in source order, without an id
//! - `Item`: what the catalog persists, with a stable id assigned at ingestion

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// A cleaned checklist row, as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    /// Whether the row was marked with `**X**`
    pub found: bool,
    /// Item name (never empty once emitted by the parser)
    pub name: String,
    /// Grouping key, e.g. "Boss" or "Charm"
    pub category: String,
    /// Grouping key, e.g. "Greenpath"
    pub region: String,
    /// Free-text notes, empty when the column is missing
    pub information: String,
    /// First link target found in the location column
    pub location_url: Option<String>,
}

impl ChecklistEntry {
    /// Create an entry with the required fields; information and link are empty
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            found: false,
            name: name.into(),
            category: category.into(),
            region: region.into(),
            information: String::new(),
            location_url: None,
        }
    }

    pub fn with_found(mut self, found: bool) -> Self {
        self.found = found;
        self
    }

    pub fn with_information(mut self, information: impl Into<String>) -> Self {
        self.information = information.into();
        self
    }

    pub fn with_location_url(mut self, url: impl Into<String>) -> Self {
        self.location_url = Some(url.into());
        self
    }
}

/// A catalog item.
///
/// `found` is the only field that changes after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub found: bool,
    pub name: String,
    pub category: String,
    pub region: String,
    pub information: String,
    pub location_url: Option<String>,
}

impl Item {
    /// Build the persisted form of an entry, rejecting nameless records.
    pub fn from_entry(id: i64, entry: &ChecklistEntry) -> Result<Self> {
        if id < 1 {
            return Err(Error::InvalidRecord(format!("item id must be positive, got {}", id)));
        }
        if entry.name.trim().is_empty() {
            return Err(Error::InvalidRecord(format!("item {} has an empty name", id)));
        }

        Ok(Self {
            id,
            found: entry.found,
            name: entry.name.clone(),
            category: entry.category.clone(),
            region: entry.region.clone(),
            information: entry.information.clone(),
            location_url: entry.location_url.clone(),
        })
    }
}

/// Optional filters for listing items. Absent filters match everything;
/// present filters combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemFilter {
    /// Exact match on the found flag
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub found: Option<bool>,
    /// Exact match on category
    pub category: Option<String>,
    /// Exact match on region
    pub region: Option<String>,
    /// Case-insensitive substring match on name
    pub name: Option<String>,
}

impl ItemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn found(mut self, found: bool) -> Self {
        self.found = Some(found);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Drop empty string filters, which query strings like `?region=` produce
    pub fn normalized(self) -> Self {
        fn non_empty(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        Self {
            found: self.found,
            category: non_empty(self.category),
            region: non_empty(self.region),
            name: non_empty(self.name),
        }
    }

    /// Check the name filter against an item name
    pub fn matches_name(&self, name: &str) -> bool {
        match &self.name {
            Some(pattern) => name.to_lowercase().contains(&pattern.to_lowercase()),
            None => true,
        }
    }
}

/// A boolean as it arrives from JSON or a query string
#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

/// Parse the spellings a query string uses for booleans.
/// `Some(None)` means the value was empty.
fn parse_flag(text: &str) -> Option<Option<bool>> {
    match text.trim().to_ascii_lowercase().as_str() {
        "" => Some(None),
        "true" | "1" | "yes" | "on" => Some(Some(true)),
        "false" | "0" | "no" | "off" => Some(Some(false)),
        _ => None,
    }
}

/// Accept `true`/`false` as well as `1`/`0`, `yes`/`no`, `on`/`off`
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(value)) => Ok(Some(value)),
        Some(Flag::Text(text)) => parse_flag(&text)
            .ok_or_else(|| D::Error::custom(format!("invalid boolean `{}`", text))),
    }
}
