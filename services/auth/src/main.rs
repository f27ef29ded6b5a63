use anyhow::Result;
use axum_extra::extract::cookie::Key;
use campus::settings::Settings;
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod password;
mod rate_limiter;
mod repositories;
mod routes;
mod state;
mod validation;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let settings = Settings::load("0.0.0.0:3000")?;
    let cookie_key = Key::from(settings.cookie_key_bytes()?);

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool).await?;

    let bind_address = settings.bind_address.clone();
    let app_state = AppState::new(pool, settings, cookie_key);

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "Authentication service listening");

    axum::serve(listener, app).await?;

    Ok(())
}
