use anyhow::Result;
use campus::{settings::Settings, store::PgStore};
use common::database::{DatabaseConfig, health_check, init_pool};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod digest;
mod scheduler;

use scheduler::DigestScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting digest notifier");

    let settings = Settings::load("0.0.0.0:3002")?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let digest = DigestScheduler::new(
        PgStore::new(pool),
        settings.mailer(),
        settings.digest.concurrency,
    );
    let mut scheduler = digest.start(&settings.digest.schedule).await?;

    info!("Digest notifier started successfully");

    // Keep the service running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down digest notifier");
    scheduler.shutdown().await?;

    Ok(())
}
