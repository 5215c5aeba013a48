//! Checklist Parser - markdown table to catalog entries
//!
//! The source checklist is a markdown document with prose and one or more
//! pipe-delimited tables. Columns, in order:
//!
//! | found | location | name | category | region | information (optional) |
//!
//! Parsing strategy:
//! - Only rows that start and end with `|` are considered
//! - The first table row is the header and is discarded; its separator row
//!   (`|---|:---:|`) opens the data section
//! - Once data has started, prose and blank lines never end it: pipe rows
//!   after prose are still data
//! - The one exception is a pipe row after prose that is directly followed by
//!   a separator row. That row is the header of another table and is dropped
//! - Separator rows inside the data section are skipped
//! - Malformed rows (fewer than five cells, empty name) are skipped silently

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::Result;
use crate::item::ChecklistEntry;

/// Minimum number of cells for a data row
const MIN_CELLS: usize = 5;

const COL_FOUND: usize = 0;
const COL_LOCATION: usize = 1;
const COL_NAME: usize = 2;
const COL_CATEGORY: usize = 3;
const COL_REGION: usize = 4;
const COL_INFORMATION: usize = 5;

fn found_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*[xX]\*\*").unwrap())
}

fn link_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[.*?\]\((https?://[^)\s]+)\)").unwrap())
}

fn link_text() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\([^)]+\)").unwrap())
}

fn bold() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap())
}

fn italic() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*]+)\*").unwrap())
}

fn separator_cell() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^:?-{3,}:?$").unwrap())
}

/// Where the scanner is relative to the checklist table
#[derive(Debug, Clone, PartialEq, Eq)]
enum TableState<'a> {
    /// No table row seen yet
    Outside,
    /// Header seen, waiting for the separator row
    Header,
    /// Separator seen, rows are data
    Data,
    /// Data section, interrupted by prose
    Interrupted,
    /// First pipe row after prose, held until the next row shows whether it
    /// is data or the header of another table
    Held(Vec<&'a str>),
}

/// True if the cell holds the `**X**` found marker (case-insensitive)
pub fn parse_found(cell: &str) -> bool {
    found_marker().is_match(cell)
}

/// Extract the first http(s) URL from a `[label](url)` link in the cell
pub fn extract_url(cell: &str) -> Option<String> {
    link_url()
        .captures(cell)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strip markdown links and emphasis, collapse whitespace
pub fn clean_text(text: &str) -> String {
    let text = link_text().replace_all(text, "$1");
    let text = bold().replace_all(&text, "$1");
    let text = italic().replace_all(&text, "$1");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_table_row(line: &str) -> bool {
    line.len() >= 2 && line.starts_with('|') && line.ends_with('|')
}

/// Split a table row into trimmed cells, dropping the fragments outside the
/// leading and trailing delimiters
fn split_cells(line: &str) -> Vec<&str> {
    let inner = &line[1..line.len() - 1];
    inner.split('|').map(str::trim).collect()
}

fn is_separator_row(cells: &[&str]) -> bool {
    let mut saw_dashes = false;
    for cell in cells {
        if cell.is_empty() {
            continue;
        }
        if !separator_cell().is_match(cell) {
            return false;
        }
        saw_dashes = true;
    }
    saw_dashes
}

fn parse_row(cells: &[&str]) -> Option<ChecklistEntry> {
    if cells.len() < MIN_CELLS {
        tracing::trace!("Skipping row with {} cells", cells.len());
        return None;
    }

    let name = clean_text(cells[COL_NAME]);
    if name.is_empty() {
        tracing::trace!("Skipping row without a name");
        return None;
    }

    Some(ChecklistEntry {
        found: parse_found(cells[COL_FOUND]),
        location_url: extract_url(cells[COL_LOCATION]),
        name,
        category: clean_text(cells[COL_CATEGORY]),
        region: clean_text(cells[COL_REGION]),
        information: cells
            .get(COL_INFORMATION)
            .map(|cell| clean_text(cell))
            .unwrap_or_default(),
    })
}

/// Parse a checklist document into entries, in source order
pub fn parse(document: &str) -> Vec<ChecklistEntry> {
    let mut entries = Vec::new();
    let mut state = TableState::Outside;

    for line in document.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !is_table_row(line) {
            state = match state {
                TableState::Outside | TableState::Header => TableState::Outside,
                TableState::Data | TableState::Interrupted => TableState::Interrupted,
                TableState::Held(held) => {
                    entries.extend(parse_row(&held));
                    TableState::Interrupted
                }
            };
            continue;
        }

        let cells = split_cells(line);
        let separator = is_separator_row(&cells);

        state = match (state, separator) {
            (TableState::Outside, _) => TableState::Header,
            (TableState::Header, true) => TableState::Data,
            (TableState::Header, false) => TableState::Header,
            (TableState::Data | TableState::Interrupted, true) => TableState::Data,
            (TableState::Data, false) => {
                entries.extend(parse_row(&cells));
                TableState::Data
            }
            (TableState::Interrupted, false) => TableState::Held(cells),
            (TableState::Held(header), true) => {
                tracing::trace!("Skipping header row of another table ({} cells)", header.len());
                TableState::Data
            }
            (TableState::Held(held), false) => {
                entries.extend(parse_row(&held));
                entries.extend(parse_row(&cells));
                TableState::Data
            }
        };
    }

    if let TableState::Held(held) = state {
        entries.extend(parse_row(&held));
    }

    entries
}

/// Read and parse a checklist file
pub fn parse_file(path: &Path) -> Result<Vec<ChecklistEntry>> {
    let content = std::fs::read_to_string(path)?;
    let entries = parse(&content);
    tracing::debug!("Parsed {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "| Found | Location | Name | Category | Region | Information |";

    #[test]
    fn test_single_row() {
        let doc = "\
| Found | Location | Name | Category | Region |
|---|---|---|---|---|
| **X** | [](http://x) | Vengeful Spirit | Spell | Distant Village |
";
        let entries = parse(doc);
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert!(e.found);
        assert_eq!(e.location_url.as_deref(), Some("http://x"));
        assert_eq!(e.name, "Vengeful Spirit");
        assert_eq!(e.category, "Spell");
        assert_eq!(e.region, "Distant Village");
        assert_eq!(e.information, "");
    }

    #[test]
    fn test_prose_and_alignment_row() {
        let doc = format!(
            "# Checklist\n\nSome intro text.\n\n{}\n|:---:|:---|---:|---|---|---|\n\
             | | | Mothwing Cloak | Equipment | Greenpath | Defeat *Hornet* |\n\
             | **x** | [map](https://example.com/a) | [Hornet](https://wiki/Hornet) | **Boss** | Greenpath | |\n",
            HEADER
        );
        let entries = parse(&doc);
        assert_eq!(entries.len(), 2);

        assert!(!entries[0].found);
        assert_eq!(entries[0].location_url, None);
        assert_eq!(entries[0].information, "Defeat Hornet");

        assert!(entries[1].found);
        assert_eq!(entries[1].location_url.as_deref(), Some("https://example.com/a"));
        assert_eq!(entries[1].name, "Hornet");
        assert_eq!(entries[1].category, "Boss");
    }

    #[test]
    fn test_rows_before_separator_are_not_data() {
        let doc = "\
| Found | Location | Name | Category | Region |
| | | Not Data | Nope | Nowhere |
|---|---|---|---|---|
| | | Real | Cat | Reg |
";
        let entries = parse(doc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Real");
    }

    #[test]
    fn test_skips_short_and_nameless_rows() {
        let doc = "\
| a | b | c | d | e |
|---|---|---|---|---|
| | | Short | row |
| **X** | | ** ** | Cat | Reg |
| | | Kept | Cat | Reg |
";
        let entries = parse(doc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Kept");
    }

    #[test]
    fn test_multiple_tables_concatenate() {
        let doc = "\
## Bosses
| a | b | c | d | e |
|---|---|---|---|---|
| | | False Knight | Boss | Forgotten Crossroads |

Between tables.

| a | b | c | d | e |
|---|---|---|---|---|
| | | Wayward Compass | Charm | Dirtmouth |
";
        let names: Vec<_> = parse(doc).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["False Knight", "Wayward Compass"]);
    }

    #[test]
    fn test_table_continues_after_prose() {
        let doc = "\
| a | b | c | d | e |
|---|---|---|---|---|
| | | False Knight | Boss | Forgotten Crossroads |
Greenpath entries follow.
| **X** | | Hornet | Boss | Greenpath |
| | | Mothwing Cloak | Equipment | Greenpath |
";
        let entries = parse(doc);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["False Knight", "Hornet", "Mothwing Cloak"]);
        assert!(entries[1].found);
    }

    #[test]
    fn test_single_row_after_prose_at_end() {
        let doc = "\
| a | b | c | d | e |
|---|---|---|---|---|
| | | One | C | R |
A note.
| | | Two | C | R |
Another note.
| | | Three | C | R |";
        let names: Vec<_> = parse(doc).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["One", "Two", "Three"]);
    }

    #[test]
    fn test_header_without_separator_is_not_data() {
        let doc = "\
| a | b | c | d | e |
Just prose.
| Found | Location | Name | Category | Region |
|---|---|---|---|---|
| | | Real | Cat | Reg |
";
        let names: Vec<_> = parse(doc).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Real"]);
    }

    #[test]
    fn test_blank_lines_do_not_close_table() {
        let doc = "\
| a | b | c | d | e |
|---|---|---|---|---|
| | | One | C | R |

| | | Two | C | R |
";
        assert_eq!(parse(doc).len(), 2);
    }

    #[test]
    fn test_separator_inside_data_is_skipped() {
        let doc = "\
| a | b | c | d | e |
|---|---|---|---|---|
| | | One | C | R |
|---|---|---|---|---|
| | | Two | C | R |
";
        let names: Vec<_> = parse(doc).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["One", "Two"]);
    }

    #[test]
    fn test_parse_found_requires_bold() {
        assert!(parse_found("**X**"));
        assert!(parse_found(" **x** "));
        assert!(!parse_found("X"));
        assert!(!parse_found("*X*"));
        assert!(!parse_found(""));
    }

    #[test]
    fn test_extract_url() {
        assert_eq!(extract_url("[](http://x)").as_deref(), Some("http://x"));
        assert_eq!(
            extract_url("see [here](https://a.b/c) and [there](https://d.e)").as_deref(),
            Some("https://a.b/c")
        );
        assert_eq!(extract_url("[label](ftp://nope)"), None);
        assert_eq!(extract_url("https://bare.url"), None);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("[Hornet](https://x)  **Boss**"), "Hornet Boss");
        assert_eq!(clean_text("  *Salubra's*   Blessing \n "), "Salubra's Blessing");
        assert_eq!(clean_text("[](https://x)"), "");
        assert_eq!(clean_text("plain"), "plain");
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(Path::new("/definitely/not/here.md")).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
