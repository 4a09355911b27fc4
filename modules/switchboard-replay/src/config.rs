use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "switchboard_engine=info,replay=info";
const DEFAULT_NAME: &str = "replay";

/// Replay settings loaded from environment variables.
/// Command-line arguments take precedence over anything set here.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub script: Option<PathBuf>,
    pub log_filter: Option<String>,
    pub json_logs: bool,
    pub name: String,
}

impl ReplayConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            script: lookup("SWITCHBOARD_SCRIPT")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            log_filter: lookup("SWITCHBOARD_LOG").filter(|s| !s.is_empty()),
            json_logs: lookup("SWITCHBOARD_LOG_JSON")
                .unwrap_or_else(|| "false".to_string())
                .parse()
                .unwrap_or(false),
            name: lookup("SWITCHBOARD_NAME")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
        }
    }

    pub fn with_script(mut self, script: Option<PathBuf>) -> Self {
        if script.is_some() {
            self.script = script;
        }
        self
    }

    pub fn with_log_filter(mut self, filter: Option<String>) -> Self {
        if filter.is_some() {
            self.log_filter = filter;
        }
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs |= json;
        self
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        if let Some(name) = name {
            self.name = name;
        }
        self
    }

    pub fn script_path(&self) -> Result<&Path> {
        self.script
            .as_deref()
            .ok_or_else(|| anyhow!("No script given. Pass a path or set SWITCHBOARD_SCRIPT"))
    }

    /// Explicit filter first, then `RUST_LOG`, then the crate default.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        match &self.log_filter {
            Some(filter) => EnvFilter::try_new(filter)
                .with_context(|| format!("Invalid log filter: {filter}")),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
        }
    }
}
