//! Enrollment Core - HTTP service entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │  Config  │───▶│    Store     │───▶│   Services   │───▶│   Gateway    │
//! │  (YAML)  │    │ (PG/Memory)  │    │(Enroll/Prog) │    │   (axum)     │
//! └──────────┘    └──────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! Usage: `enrollment_core [--env dev] [--port 8080]`

use std::sync::Arc;

use anyhow::{Context, bail};

use enrollment_core::catalog::CatalogSeed;
use enrollment_core::config::AppConfig;
use enrollment_core::db::{Database, PgStore, init_schema};
use enrollment_core::gateway::{self, AppState, Stores};
use enrollment_core::notify::build_notifier;
use enrollment_core::payment::PaymentGateway;
use enrollment_core::store::MemoryStore;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = enrollment_core::logging::init_logging(&app_config);

    tracing::info!("Starting Enrollment Core in {} mode", env);

    if app_config.jwt_secret.trim().is_empty() {
        bail!("jwt_secret is empty; set it in config/{}.yaml or JWT_SECRET", env);
    }

    let payments = Arc::new(
        PaymentGateway::from_config(&app_config.payments)
            .context("Failed to configure payment providers")?,
    );
    let notifier = build_notifier(&app_config.notifications)
        .context("Failed to configure notification relay")?;

    // PostgreSQL when configured, otherwise everything lives in memory
    let (stores, pg_db) = match app_config.postgres_url.as_deref() {
        Some(url) => {
            let db = Arc::new(
                Database::connect(url)
                    .await
                    .context("Failed to connect to PostgreSQL")?,
            );
            init_schema(db.pool()).await?;
            let store = Arc::new(PgStore::new(db.pool().clone()));
            (Stores::shared(store), Some(db))
        }
        None => {
            tracing::warn!("postgres_url not set, using in-memory store (data is not persisted)");
            (Stores::shared(Arc::new(MemoryStore::new())), None)
        }
    };

    if let Some(path) = app_config.catalog_seed.as_deref() {
        let (programs, lessons) = CatalogSeed::load(path)?
            .apply(stores.catalog.as_ref())
            .await?;
        tracing::info!(programs, lessons, path, "Catalog seeded");
    }

    let mut state = AppState::new(
        stores,
        payments,
        notifier,
        &app_config.jwt_secret,
        &app_config.payments.callback_base_url,
    );
    if let Some(db) = pg_db {
        state = state.with_database(db);
    }

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    gateway::run_server(&app_config.gateway.host, port, Arc::new(state)).await
}
