//! Completion statistics

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::storage::Catalog;
use crate::{Error, Result};

/// Column an aggregate is partitioned by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Region,
    Category,
}

impl GroupBy {
    /// Column name in the items table
    pub fn column(&self) -> &'static str {
        match self {
            GroupBy::Region => "region",
            GroupBy::Category => "category",
        }
    }
}

impl FromStr for GroupBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "region" | "regions" => Ok(GroupBy::Region),
            "category" | "categories" => Ok(GroupBy::Category),
            _ => Err(Error::Rejected(format!("Unknown grouping: {}", s))),
        }
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// Percentage of found items, rounded to two decimals; 0 for an empty partition
pub fn completion_percent(found_count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = found_count as f64 / total as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

/// Completion counts for one partition of the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionStats {
    pub total: u64,
    pub found_count: u64,
    pub not_found_count: u64,
    pub completion_percent: f64,
}

impl CompletionStats {
    pub fn new(total: u64, found_count: u64) -> Self {
        let found_count = found_count.min(total);
        Self {
            total,
            found_count,
            not_found_count: total - found_count,
            completion_percent: completion_percent(found_count, total),
        }
    }
}

impl std::fmt::Display for CompletionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} found ({:.2}%)",
            self.found_count, self.total, self.completion_percent
        )
    }
}

/// Completion counts for one distinct value of a grouping column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub group: String,
    #[serde(flatten)]
    pub stats: CompletionStats,
}

impl Catalog {
    /// Completion over the whole catalog
    pub fn stats(&self) -> Result<CompletionStats> {
        let conn = self.connect()?;
        let (total, found): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN found THEN 1 ELSE 0 END), 0) FROM items",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(CompletionStats::new(total as u64, found as u64))
    }

    /// Completion per distinct value of `by`, ordered by that value
    pub fn group_stats(&self, by: GroupBy) -> Result<Vec<GroupStats>> {
        let sql = format!(
            r#"
            SELECT {col}, COUNT(*), COALESCE(SUM(CASE WHEN found THEN 1 ELSE 0 END), 0)
            FROM items
            GROUP BY {col}
            ORDER BY {col}
            "#,
            col = by.column()
        );

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                let group: String = row.get(0)?;
                let total: i64 = row.get(1)?;
                let found: i64 = row.get(2)?;
                Ok(GroupStats {
                    group,
                    stats: CompletionStats::new(total as u64, found as u64),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::tests::{loaded_catalog, open_temp};

    #[test]
    fn test_completion_percent() {
        assert_eq!(completion_percent(0, 0), 0.0);
        assert_eq!(completion_percent(1, 3), 33.33);
        assert_eq!(completion_percent(2, 3), 66.67);
        assert_eq!(completion_percent(3, 3), 100.0);
        assert_eq!(completion_percent(0, 7), 0.0);
    }

    #[test]
    fn test_overall_stats() {
        let (_dir, catalog) = loaded_catalog();
        let stats = catalog.stats().unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.found_count, 2);
        assert_eq!(stats.not_found_count, 3);
        assert_eq!(stats.completion_percent, 40.0);
    }

    #[test]
    fn test_empty_catalog_stats() {
        let (_dir, catalog) = open_temp();
        let stats = catalog.stats().unwrap();
        assert_eq!(stats, CompletionStats::new(0, 0));
        assert_eq!(stats.completion_percent, 0.0);
        assert!(catalog.group_stats(GroupBy::Region).unwrap().is_empty());
    }

    #[test]
    fn test_region_stats() {
        let (_dir, catalog) = loaded_catalog();
        let rows = catalog.group_stats(GroupBy::Region).unwrap();

        let groups: Vec<_> = rows.iter().map(|r| r.group.as_str()).collect();
        assert_eq!(groups, vec!["City of Tears", "Forgotten Crossroads", "Greenpath"]);

        let greenpath = &rows[2].stats;
        assert_eq!(greenpath.total, 3);
        assert_eq!(greenpath.found_count, 1);
        assert_eq!(greenpath.completion_percent, 33.33);
    }

    #[test]
    fn test_counts_sum_to_total_at_every_granularity() {
        let (_dir, catalog) = loaded_catalog();
        catalog.set_found(4, true).unwrap();

        let mut all = vec![catalog.stats().unwrap()];
        for by in [GroupBy::Region, GroupBy::Category] {
            all.extend(catalog.group_stats(by).unwrap().into_iter().map(|g| g.stats));
        }

        for stats in all {
            assert_eq!(stats.found_count + stats.not_found_count, stats.total);
            assert_eq!(
                stats.completion_percent,
                completion_percent(stats.found_count, stats.total)
            );
        }
    }

    #[test]
    fn test_stats_reflect_updates() {
        let (_dir, catalog) = loaded_catalog();
        catalog.set_found(5, true).unwrap();

        let spells = catalog
            .group_stats(GroupBy::Category)
            .unwrap()
            .into_iter()
            .find(|g| g.group == "Spell")
            .unwrap();
        assert_eq!(spells.stats.found_count, 2);
        assert_eq!(spells.stats.completion_percent, 100.0);
    }

    #[test]
    fn test_group_by_from_str() {
        assert_eq!("regions".parse::<GroupBy>().unwrap(), GroupBy::Region);
        assert_eq!("Category".parse::<GroupBy>().unwrap(), GroupBy::Category);
        assert!("charm".parse::<GroupBy>().is_err());
    }

    #[test]
    fn test_group_stats_serializes_flat() {
        let row = GroupStats { group: "Greenpath".into(), stats: CompletionStats::new(4, 1) };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["group"], "Greenpath");
        assert_eq!(json["not_found_count"], 3);
        assert_eq!(json["completion_percent"], 25.0);
    }
}
