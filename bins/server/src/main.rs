//! SchoolMoney API Server
//!
//! Main entry point for the SchoolMoney backend service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schoolmoney_api::{AppState, create_router};
use schoolmoney_core::iban::IbanGenerator;
use schoolmoney_core::ledger::AccountFactory;
use schoolmoney_db::{DbStore, connect_with};
use schoolmoney_shared::{AppConfig, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "schoolmoney=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = connect_with(&config.database)
        .await
        .context("failed to connect to database")?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );
    let store = Arc::new(DbStore::new(db));

    let accounts = AccountFactory::new(
        Arc::new(IbanGenerator::new(config.ledger.timestamp_serial)),
        config.ledger.account_number_attempts,
    );
    let jwt_service = Arc::new(JwtService::new(JwtConfig::from(&config.jwt)));

    let state = AppState::new(store, accounts, jwt_service);
    let app = create_router(state, &config.server.cors_origins);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
