//! Sidetrek dev server
//!
//! Serves the live dbt lineage graph to the Sidetrek UI. Run it from the root
//! of a Sidetrek project (the directory holding sidetrek.config.yaml).

use anyhow::{Context, Result};
use clap::Parser;
use sidetrek_core::{resolve_root, ProjectLayout, ServerConfig};
use sidetrek_server::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sidetrek dev server - live dbt lineage for the Sidetrek UI
#[derive(Parser)]
#[command(name = "sidetrek-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root (default: current directory)
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Path to server settings (default: <project>/sidetrek.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// Coalescing window for file changes in milliseconds (default 0: one rebuild per event)
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Skip the initial `dbt run` when a client connects
    #[arg(long)]
    no_run_on_connect: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(debounce_ms) = self.debounce_ms {
            config.watcher.debounce_ms = debounce_ms;
        }
        if self.no_run_on_connect {
            config.dbt.run_on_connect = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let root = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => {
            let cwd = std::env::current_dir().context("cannot read current directory")?;
            resolve_root(&cwd, std::env::var("CUSTOM_ENV").ok().as_deref())
        }
    };

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::load_or_default(&root)?,
    };
    cli.apply_overrides(&mut config);

    let layout = ProjectLayout::discover(&root)?;
    tracing::info!(project_name = %layout.project_name, "loaded project");
    tracing::info!(models_dir = %layout.models_dir.display(), "dbt models");

    let state = Arc::new(AppState::new(&layout, &config));

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("cannot bind {}:{}", config.host, config.port))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    sidetrek_server::serve(listener, state).await?;

    Ok(())
}
