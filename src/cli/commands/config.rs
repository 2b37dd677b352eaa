//! dpe config - Print the effective configuration

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{OutputFormat, emit_json, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print only the resolved store path
    #[arg(long)]
    pub store_path: bool,
}

pub fn run(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    if args.store_path {
        let path = ctx.store_path();
        return match ctx.output_format {
            OutputFormat::Json => emit_json(&robot_ok(serde_json::json!({ "store_path": path }))),
            OutputFormat::Human => {
                println!("{}", path.display());
                Ok(())
            }
        };
    }

    match ctx.output_format {
        OutputFormat::Json => emit_json(&robot_ok(serde_json::json!({
            "root": ctx.root,
            "config": ctx.config,
        }))),
        OutputFormat::Human => {
            print!("{}", ctx.config.to_toml()?);
            Ok(())
        }
    }
}
