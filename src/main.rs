use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use rinkside::config::Config;
use rinkside::nhl::NhlWebClient;
use rinkside::ticker::{Ticker, ViewRequest};

/// Fetch one full widget view and print it as JSON. Embedding services
/// construct [`Ticker`] directly; this binary is the smoke-check path.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let source = Arc::new(NhlWebClient::new(
        &config.nhl_api_base,
        config.upstream_timeout(),
    )?);
    info!(
        "Fetching {} view from {}",
        config.team_code, config.nhl_api_base
    );

    let ticker = Ticker::new(config, source);
    let view = ticker.get_view(&ViewRequest::full()).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    Ok(())
}
