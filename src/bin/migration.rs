//! Applies or rolls back the schema.
//!
//! `migration [up|down|status]`, connecting to `DATABASE_URL` or, when that
//! is unset, the configured database.

use anyhow::{bail, Context};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

use uni_naturals_api::{config, migrator::Migrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => config::load_config()
            .context("DATABASE_URL is unset and configuration could not be loaded")?
            .database_url,
    };

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .context("failed to connect to the database")?;

    match command.as_str() {
        "up" => {
            Migrator::up(&db, None).await?;
            info!("Migration completed successfully");
        }
        "down" => {
            Migrator::down(&db, Some(1)).await?;
            info!("Rolled back the latest migration");
        }
        "status" => Migrator::status(&db).await?,
        other => bail!("unknown command '{}', expected up, down or status", other),
    }

    Ok(())
}
