//! Log setup
//!
//! The terminal belongs to the UI, so events go to a file under the config
//! directory. `RUST_LOG` overrides the default filter.

use crate::config::Config;
use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "lineage_tui=info";

/// Install the global subscriber, returning the log file path
///
/// Returns `Ok(None)` when no home directory is known; logging is then off.
pub fn init() -> Result<Option<PathBuf>> {
    let Some(path) = Config::log_path() else {
        return Ok(None);
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()?;

    tracing::info!(path = %path.display(), "logging initialized");
    Ok(Some(path))
}
