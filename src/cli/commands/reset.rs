//! dpe reset - Delete all learned statistics

use clap::Args;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, robot_ok};
use crate::error::{DpeError, Result};
use crate::storage::PatternStore;

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Confirm the wipe
    #[arg(long)]
    pub yes: bool,
}

pub fn run(ctx: &AppContext, args: &ResetArgs) -> Result<()> {
    if !args.yes {
        return Err(DpeError::ConfirmationRequired(
            "reset deletes every learned pattern; pass --yes to proceed".to_string(),
        ));
    }

    let store = ctx.open_sqlite()?;
    let removed = store.clear()?;
    info!(removed, store = %ctx.store_path().display(), "pattern store cleared");

    match ctx.output_format {
        OutputFormat::Json => emit_json(&robot_ok(serde_json::json!({ "removed": removed }))),
        OutputFormat::Human => {
            let mut layout = HumanLayout::new();
            layout
                .title("Reset")
                .kv("store", &ctx.store_path().display().to_string())
                .kv("rows removed", &removed.to_string());
            emit_human(layout);
            Ok(())
        }
    }
}
