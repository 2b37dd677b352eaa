//! dpe stats - Show learned pattern statistics

use clap::Args;
use serde::Serialize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, robot_ok};
use crate::engine::{Family, Outcome};
use crate::error::Result;
use crate::storage::{PatternStore, StoredPattern};

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Only this family: sum, range, parity, dice, trend6, streak, hybrid
    #[arg(long, short)]
    pub family: Option<Family>,

    /// Hide rows with fewer observations
    #[arg(long, default_value = "0")]
    pub min_total: u64,

    /// Maximum number of rows to show
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
struct StatsEntry {
    family: String,
    value: String,
    total: u64,
    win_a: u64,
    win_b: u64,
    rate_a: f64,
    rate_b: f64,
    weight: f64,
    power: f64,
    last_update: String,
}

impl From<&StoredPattern> for StatsEntry {
    fn from(row: &StoredPattern) -> Self {
        Self {
            family: row.family.clone(),
            value: row.value.clone(),
            total: row.stat.total,
            win_a: row.stat.wins_small,
            win_b: row.stat.wins_big,
            rate_a: row.stat.rate(Outcome::Small),
            rate_b: row.stat.rate(Outcome::Big),
            weight: row.stat.weight,
            power: row.stat.power,
            last_update: row.stat.last_update.to_rfc3339(),
        }
    }
}

pub fn run(ctx: &AppContext, args: &StatsArgs) -> Result<()> {
    let store = ctx.open_sqlite()?;
    let rows = select_rows(store.as_ref(), args)?;
    debug!(count = rows.len(), family = ?args.family, "listing patterns");

    let entries: Vec<StatsEntry> = rows.iter().map(StatsEntry::from).collect();
    match ctx.output_format {
        OutputFormat::Json => emit_json(&robot_ok(serde_json::json!({
            "count": entries.len(),
            "patterns": entries,
        }))),
        OutputFormat::Human => {
            emit_human(render_table(&entries));
            Ok(())
        }
    }
}

fn select_rows(store: &dyn PatternStore, args: &StatsArgs) -> Result<Vec<StoredPattern>> {
    let rows = store
        .list(args.family)?
        .into_iter()
        .filter(|row| row.stat.total >= args.min_total);
    Ok(match args.limit {
        Some(limit) => rows.take(limit).collect(),
        None => rows.collect(),
    })
}

fn render_table(entries: &[StatsEntry]) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title(&format!("Patterns ({})", entries.len()));
    if entries.is_empty() {
        layout.push_line("No patterns learned yet.");
        return layout;
    }
    layout.push_line(format!(
        "{:<8} {:<10} {:>6} {:>6} {:>6} {:>7} {:>7}",
        "FAMILY", "VALUE", "TOTAL", "A%", "B%", "WEIGHT", "POWER"
    ));
    for entry in entries {
        layout.push_line(format!(
            "{:<8} {:<10} {:>6} {:>5.1}% {:>5.1}% {:>7.3} {:>7.3}",
            entry.family,
            entry.value,
            entry.total,
            entry.rate_a * 100.0,
            entry.rate_b * 100.0,
            entry.weight,
            entry.power,
        ));
    }
    layout
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::engine::FeatureKey;
    use crate::storage::{MemoryStore, PatternStat};

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let stat = |total: u64| PatternStat {
            total,
            wins_small: total / 2,
            wins_big: total - total / 2,
            weight: 1.0,
            power: 1.0,
            last_update: Utc::now(),
        };
        store.seed(&FeatureKey::Sum(9), stat(2));
        store.seed(&FeatureKey::Sum(12), stat(7));
        store.seed(&FeatureKey::Parity(1), stat(9));
        store
    }

    #[test]
    fn filters_by_family_and_sample_count() {
        let store = seeded();
        let args = StatsArgs {
            family: Some(Family::Sum),
            min_total: 5,
            limit: None,
        };
        let rows = select_rows(&store, &args).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "12");
    }

    #[test]
    fn limit_applies_after_filtering() {
        let store = seeded();
        let args = StatsArgs {
            family: None,
            min_total: 0,
            limit: Some(2),
        };
        assert_eq!(select_rows(&store, &args).unwrap().len(), 2);
    }

    #[test]
    fn table_has_header_and_row_per_entry() {
        console::set_colors_enabled(false);
        let store = seeded();
        let rows = store.list(None).unwrap();
        let entries: Vec<StatsEntry> = rows.iter().map(StatsEntry::from).collect();
        let text = render_table(&entries).build();
        assert!(text.contains("FAMILY"));
        assert_eq!(text.lines().count(), 2 + 1 + entries.len());
    }
}
