//! dpe check - Verify the store is reachable

use clap::Args;
use serde::Serialize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, robot_ok};
use crate::error::Result;
use crate::storage::PatternStore;

#[derive(Args, Debug)]
pub struct CheckArgs {}

#[derive(Debug, Serialize)]
struct CheckReport {
    store_path: String,
    schema_version: u32,
    patterns: usize,
    ping: &'static str,
}

pub fn run(ctx: &AppContext, _args: &CheckArgs) -> Result<()> {
    let store = ctx.open_sqlite()?;
    store.ping()?;
    debug!("store ping ok");

    let report = CheckReport {
        store_path: ctx.store_path().display().to_string(),
        schema_version: store.schema_version(),
        patterns: store.count()?,
        ping: "ok",
    };

    match ctx.output_format {
        OutputFormat::Json => emit_json(&robot_ok(report)),
        OutputFormat::Human => {
            let mut layout = HumanLayout::new();
            layout
                .title("Store check")
                .kv("store", &report.store_path)
                .kv("schema version", &report.schema_version.to_string())
                .kv("patterns", &report.patterns.to_string())
                .kv("ping", report.ping);
            emit_human(layout);
            Ok(())
        }
    }
}
