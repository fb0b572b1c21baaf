//! lineage-tui - A terminal lineage explorer
//!
//! This is the main entry point for the lineage-tui application.
//! It uses the Component Architecture pattern from ratatui.

mod action;
mod app;
mod component;
mod components;
mod config;
mod error;
mod logging;
mod model;
mod services;
mod tui;

use crate::action::Action;
use crate::app::App;
use crate::component::Component;
use crate::config::Config;
use crate::model::EntityType;
use crate::services::{CatalogApi, HttpLineageApi, LineageApi};
use crate::tui::Tui;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::event::Event;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_SERVER: &str = "http://localhost:8585/api";

#[derive(Parser, Debug)]
#[command(name = "lineage-tui")]
#[command(about = "Explore and edit data lineage in the terminal")]
struct Cli {
    /// Entity type of the root, e.g. table, dashboard, pipeline
    entity_type: String,

    /// Fully qualified name of the root entity
    fqn: String,

    /// Metadata server base URL
    #[arg(short, long, env = "LINEAGE_SERVER")]
    server: Option<String>,

    /// Bearer token for the metadata server
    #[arg(short, long, env = "LINEAGE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Serve lineage from a JSON or YAML catalog snapshot instead of a server
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Upstream depth of the initial fetch
    #[arg(short, long)]
    upstream: Option<u32>,

    /// Downstream depth of the initial fetch
    #[arg(short, long)]
    downstream: Option<u32>,

    /// Allow saving lineage edits
    #[arg(long)]
    edit: bool,

    /// Remember the connection options in the config file
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    /// Command-line options take precedence over the config file
    fn merge_into(&self, mut config: Config) -> Config {
        if let Some(server) = &self.server {
            config.server_url = Some(server.clone());
        }
        if let Some(token) = &self.token {
            config.api_token = Some(token.clone());
        }
        if let Some(catalog) = &self.catalog {
            config.catalog_path = Some(catalog.to_string_lossy().to_string());
        }
        if let Some(depth) = self.upstream {
            config.lineage.upstream_depth = depth;
        }
        if let Some(depth) = self.downstream {
            config.lineage.downstream_depth = depth;
        }
        if self.edit {
            config.can_edit_lineage = true;
        }
        config
    }
}

fn backend(config: &Config) -> Result<Arc<dyn LineageApi>> {
    if let Some(path) = &config.catalog_path {
        let api = CatalogApi::open(&PathBuf::from(path))
            .with_context(|| format!("Could not open catalog {}", path))?;
        return Ok(Arc::new(api));
    }
    let server = config.server_url.as_deref().unwrap_or(DEFAULT_SERVER);
    Ok(Arc::new(HttpLineageApi::new(server, config.api_token.clone())?))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let entity_type: EntityType = cli.entity_type.parse().map_err(|e: String| anyhow!(e))?;

    let log_path = logging::init()?;
    let config = cli.merge_into(Config::load().unwrap_or_default());
    if cli.save_config {
        config.save()?;
    }
    let api = backend(&config)?;
    info!(source = %api.describe(), fqn = %cli.fqn, "starting");

    // Setup terminal
    let mut tui = Tui::new()?.with_tick_rate(Duration::from_millis(50));
    tui.enter()?;

    // Create app state
    let mut app = App::new(api, config);
    app.init()?;
    app.open(&cli.fqn, entity_type);

    // Main event loop
    let result = run_app(&mut tui, &mut app);

    // Cleanup terminal
    tui.exit()?;

    if let Err(err) = result {
        error!(error = ?err, "application error");
        eprintln!("Error: {:?}", err);
        if let Some(path) = log_path {
            eprintln!("See {} for details", path.display());
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Run the main application loop
fn run_app(tui: &mut Tui, app: &mut App) -> Result<()> {
    while !app.should_quit {
        // Draw the UI
        tui.draw(|frame| {
            if let Err(e) = app.draw(frame, frame.area()) {
                error!(error = %e, "draw failed");
            }
        })?;

        // Poll for events
        if let Some(event) = tui.next_event()? {
            // Convert event to action
            let action = match event {
                Event::Key(key) => app.handle_key_event(key)?,
                Event::Mouse(mouse) => app.handle_mouse_event(mouse)?,
                Event::Resize(w, h) => Some(Action::Resize(w, h)),
                _ => None,
            };

            // Action might produce a follow-up action
            let mut current_action = action;
            while let Some(a) = current_action {
                current_action = app.update(a)?;
            }
        } else {
            // No event - send a tick for time-based updates
            app.update(Action::Tick)?;
        }
    }

    Ok(())
}
