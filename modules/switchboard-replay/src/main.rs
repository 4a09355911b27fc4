use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use tracing::info;

mod config;
mod script;

use config::ReplayConfig;
use script::{run_script, Script};

#[derive(Parser)]
#[command(name = "replay", about = "Replay a JSON event script through a mediator")]
struct Cli {
    /// Script to replay (overrides SWITCHBOARD_SCRIPT)
    script: Option<PathBuf>,

    /// Tracing filter directives (overrides SWITCHBOARD_LOG and RUST_LOG)
    #[arg(long)]
    log: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Mediator name shown in dispatch spans
    #[arg(long)]
    name: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ReplayConfig::from_env()
        .with_script(cli.script)
        .with_log_filter(cli.log)
        .with_json_logs(cli.json_logs)
        .with_name(cli.name);

    let subscriber = tracing_subscriber::fmt().with_env_filter(config.env_filter()?);
    if config.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let path = config.script_path()?;
    info!(script = %path.display(), name = %config.name, "Starting replay");

    let script = Script::load(path)?;
    let report = run_script(script, &config.name)?;

    info!(
        steps = report.steps,
        notified = report.notified.len(),
        cancelled = report.cancelled(),
        "Replay complete"
    );
    println!("{}", serde_json::to_string_pretty(&Value::Object(report.context))?);

    Ok(())
}
