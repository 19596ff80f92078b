use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod analysis;
mod api;
mod config;
mod explorer;
mod model;
mod resolver;
mod scanner;
mod settings;

#[cfg(target_family = "unix")]
mod unix;

#[cfg(target_family = "windows")]
mod windows;

use crate::analysis::PortAnalyzer;
use crate::api::AppState;
use crate::config::ConfigStore;
use crate::scanner::SystemPortSource;
use crate::settings::Settings;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let settings = Settings::parse();
    init_tracing(settings.debug);

    info!("=== NotePorts starting ===");
    info!(host = %settings.host, port = settings.port, debug = settings.debug, "settings");

    let store = Arc::new(ConfigStore::open(&settings.config));
    store
        .init()
        .wrap_err("failed to initialize config file")?;
    info!(path = %store.path().display(), entries = store.current().len(), "config loaded");

    let state = AppState::new(store, PortAnalyzer::new(Arc::new(SystemPortSource)));

    api::serve(&settings.host, settings.port, state)
        .await
        .wrap_err_with(|| format!("failed to serve on {}:{}", settings.host, settings.port))
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--debug`.
fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("noteports={level},tower_http={level}")));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
