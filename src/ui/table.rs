use tabled::{settings::Style, Table, Tabled};

use crate::query::{CompletionStats, GroupStats};

const BAR_WIDTH: usize = 20;

#[derive(Tabled)]
pub struct StatsRow {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Found")]
    pub found: String,
    #[tabled(rename = "Completion")]
    pub completion: String,
    #[tabled(rename = "")]
    pub bar: String,
}

impl StatsRow {
    fn new(group: &str, stats: &CompletionStats) -> Self {
        Self {
            group: group.to_string(),
            found: format!("{}/{}", stats.found_count, stats.total),
            completion: format!("{:.2}%", stats.completion_percent),
            bar: completion_bar(stats.completion_percent),
        }
    }
}

/// Text progress bar, e.g. `█████░░░░░░░░░░░░░░░` for 25%
pub fn completion_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

#[derive(Default)]
pub struct StatsTable {
    rows: Vec<StatsRow>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, group: &str, stats: &CompletionStats) {
        self.rows.push(StatsRow::new(group, stats));
    }

    pub fn add_groups(&mut self, groups: &[GroupStats]) {
        for group in groups {
            self.add_row(&group.group, &group.stats);
        }
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}
