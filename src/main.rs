// src/main.rs

use std::time::Duration;

use engagement_store::config::Config;
use engagement_store::db;
use engagement_store::routes;
use engagement_store::services::{counters, stories};
use engagement_store::state::AppState;
use sqlx::SqlitePool;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired stories are swept.
const STORY_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let pool = db::connect(&config).await?;
    tracing::info!("Database connected...");

    tracing::info!("Running migrations...");
    db::migrate(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    // `--reconcile`: repair counters once and exit.
    if std::env::args().skip(1).any(|arg| arg == "--reconcile") {
        let report = counters::reconcile(&pool).await?;
        tracing::info!("Reconcile finished, {} counters corrected", report.total());
        return Ok(());
    }

    if config.reconcile_on_startup {
        if let Err(e) = counters::reconcile(&pool).await {
            tracing::error!("Startup counter reconciliation failed: {:?}", e);
        }
    }

    spawn_story_purge(pool.clone(), config.story_ttl());

    let state = AppState {
        pool,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_story_purge(pool: SqlitePool, ttl: chrono::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STORY_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = stories::purge_expired(&pool, ttl).await {
                tracing::error!("Failed to purge expired stories: {:?}", e);
            }
        }
    });
}
