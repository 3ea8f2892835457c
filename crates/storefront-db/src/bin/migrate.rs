//! # Migration Runner
//!
//! Applies the embedded schema migrations to a database file.
//!
//! ## Usage
//! ```bash
//! # Uses STOREFRONT_DATABASE_PATH (default ./storefront.db)
//! cargo run -p storefront-db --bin migrate
//!
//! # Explicit path
//! cargo run -p storefront-db --bin migrate -- --db ./data/store.db
//!
//! # More logging
//! RUST_LOG=storefront_db=debug cargo run -p storefront-db --bin migrate
//! ```

use std::env;
use storefront_db::migrations::migration_status;
use storefront_db::{Database, DbConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = DbConfig::from_env()?;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: migrate [--db PATH]");
                return Ok(());
            }
            other => {
                return Err(format!("Unknown argument: {other}").into());
            }
        }
        i += 1;
    }

    let db = Database::new(config.run_migrations(true)).await?;

    let (total, applied) = migration_status(db.pool()).await?;
    info!(total, applied, "Schema is up to date");

    db.close().await;
    Ok(())
}
