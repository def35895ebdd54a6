//! Rotation Engine — assigns inbound sales leads to reps via two
//! independent round-robin rotations, backed by an append-only event log.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rotation_engine::api::{self, AppState};
use rotation_engine::config;
use rotation_engine::middleware;
use rotation_engine::roster::RosterStore;
use rotation_engine::storage::SqliteStore;
use rotation_engine::RotationEngine;

/// CLI flags override the equivalent environment variables read by
/// `Config::from_env`.
#[derive(Debug, Parser)]
#[command(name = "rotation-engine")]
struct Cli {
    #[arg(long, env = "DATABASE_PATH")]
    db_path: Option<String>,

    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let cli = Cli::parse();
    let mut config = config::Config::from_env()?;
    if let Some(db_path) = cli.db_path {
        config.database_path = db_path;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    init_tracing(&config.log_filter);

    info!("rotation engine starting, database at {}", config.database_path);

    let store = Arc::new(SqliteStore::open(&config.database_path).context("opening event store")?);
    let reps = store
        .load()
        .context("loading roster")?
        .map(|snapshot| snapshot.reps)
        .unwrap_or_default();

    if reps.is_empty() {
        info!("no roster found in database, starting with an empty roster");
    }

    let engine = Arc::new(RotationEngine::new(store, reps, config.sequence_cap)?);
    let state = AppState::new(engine);

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::logging::request_logging_simple,
        ));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!("rotation engine listening on {addr}");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    dotenv::dotenv().ok();
}
