//! salesrail-engine - Lead Attribution & Commission Ledger Engine
//!
//! Standalone service for the SalesRail funnel: lead qualification and
//! dedup, affiliate attribution, round-robin call assignment, and the
//! commission ledger.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use salesrail_common::config::{database_path, resolve_root_folder};
use salesrail_common::db::init_database;
use salesrail_engine::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "salesrail-engine", about = "SalesRail attribution and ledger engine")]
struct Cli {
    /// Root data folder (overrides SALESRAIL_ROOT and the config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Port to listen on (overrides the http_port setting)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init, before any
    // database delays
    info!(
        "Starting SalesRail Engine v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();

    let root_folder = resolve_root_folder(cli.root_folder.as_deref(), "SALESRAIL_ROOT")?;
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;

    let port = match cli.port {
        Some(port) => port,
        None => {
            let stored: i64 = sqlx::query_scalar(
                "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'http_port'",
            )
            .fetch_optional(&pool)
            .await?
            .unwrap_or(5730);
            stored as u16
        }
    };

    let state = AppState::new(pool);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("salesrail-engine listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
