//! Dergi API server binary.
//!
//! Connects to PostgreSQL, applies migrations, optionally seeds reference
//! data and serves the REST API until Ctrl-C or SIGTERM.

use std::sync::Arc;

use clap::Parser;
use dergi_core::store::Store;
use dergi_core::store::memory::MemoryStore;
use dergi_core::store::postgres::PgStore;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "dergi_server", about = "Dergi API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/dergi"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Seed roles, demo accounts and sample publications before serving.
    #[arg(long, default_value_t = false)]
    seed: bool,

    /// Keep all data in process memory instead of PostgreSQL. Implies `--seed`.
    #[arg(long, default_value_t = false)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dergi_api=debug,dergi_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = dergi_api::config::ApiConfig::from_env();
    config.bind_addr = args.bind.clone();
    config.database_url = args.database_url.clone();

    let store: Arc<dyn Store> = if args.memory {
        info!("using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        info!(
            max_connections = args.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&args.database_url)
            .await?;

        info!("running database migrations");
        dergi_api::migrate(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    if args.seed || args.memory {
        let summary = dergi_core::seed::seed(store.as_ref()).await?;
        info!(
            users = ?summary.users,
            publications = ?summary.publications,
            "seed data ready"
        );
    }

    let state = dergi_api::AppState {
        store,
        config: config.clone(),
    };
    let app = dergi_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(
        addr = %local_addr,
        secure_cookies = config.secure_cookies,
        "REST API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C, shutting down"),
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received SIGTERM, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
