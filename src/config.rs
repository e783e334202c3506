use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::cli::Cli;
use crate::download::paths::expand_tilde;
use crate::retry::RetryPolicy;

/// Directory under the user config dir that holds records by default.
const RECORDS_DIR_NAME: &str = "AssetDownloader";

/// Settings resolved from the command line and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub records_dir: PathBuf,
    pub api_url: String,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
    pub concurrency: Option<usize>,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let records_dir = match cli.records_dir.as_deref() {
            Some(dir) if !dir.is_empty() => expand_tilde(dir),
            _ => default_records_dir()?,
        };

        let retry = RetryPolicy {
            max_retries: cli.max_retries,
            base_delay: Duration::from_secs(cli.retry_delay),
            ..RetryPolicy::default()
        };

        Ok(Self {
            records_dir,
            api_url: cli.api_url.clone(),
            retry,
            timeout: cli.timeout.map(Duration::from_secs),
            concurrency: cli.concurrency.map(|n| n.get()),
        })
    }
}

pub fn default_records_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir().context("could not determine the user config directory")?;
    Ok(base.join(RECORDS_DIR_NAME))
}
