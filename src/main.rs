//! Tourbook server
//!
//! Reads `config/tourbook.yaml` (or the file named by `TOURBOOK_CONFIG`),
//! applies environment overrides and serves until SIGTERM or Ctrl+C.

use std::path::Path;
use tourbook::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/tourbook.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tourbook=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = std::env::var("TOURBOOK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = if Path::new(&path).exists() {
        tracing::info!(%path, "loading configuration");
        AppConfig::from_yaml_file(&path)?
    } else {
        tracing::warn!(%path, "configuration file not found, using defaults");
        AppConfig::default()
    };
    let config = config.apply_env()?;

    ServerBuilder::new(config).serve().await
}
