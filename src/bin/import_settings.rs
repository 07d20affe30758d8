use anyhow::{bail, Context, Result};
use langlink::{cache::MemoryCache, config::Config, db::Database, Site};
use std::sync::Arc;
use tracing::info;

const USAGE: &str = "Usage: import-settings <file.json> | import-settings --export";

fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("import_settings=info".parse()?)
                .add_directive("langlink=info".parse()?),
        )
        .init();

    let Some(argument) = std::env::args().nth(1) else {
        bail!(USAGE);
    };

    // Load config from environment
    let config = Config::from_env()?;
    let db = Database::open(&config.database_path)
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    let site = Site::new(db, Arc::new(MemoryCache::new()));

    if argument == "--export" {
        let configuration = site.export_configuration();
        println!("{}", serde_json::to_string_pretty(&configuration)?);
        return Ok(());
    }
    if argument.starts_with('-') {
        bail!(USAGE);
    }

    info!("Importing site configuration from {}", argument);
    site.import_configuration(&argument)?;

    let languages = site.registry.list();
    info!(
        "✓ Imported {} languages into {} (default: {})",
        languages.len(),
        config.database_path,
        site.registry.default_language().slug
    );
    Ok(())
}
