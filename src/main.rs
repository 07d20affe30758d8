use anyhow::{Context, Result};
use langlink::{config::Config, server, Site};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("langlink=info".parse()?),
        )
        .init();

    info!("Starting langlink");

    // Load configuration from environment
    let config = Config::from_env()?;

    let site = Arc::new(Site::open(&config)?);
    info!(
        "Serving {} languages for {}",
        site.registry.list().len(),
        site.registry.settings().home_url
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!("Listening on port {}", config.port);

    axum::serve(listener, server::router(site))
        .await
        .context("Server error")?;
    Ok(())
}
