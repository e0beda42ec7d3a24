use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reverie_cloud::{S3ArtifactStore, StorageConfig};
use reverie_core::card::{CardConfig, CardRenderer};
use reverie_core::ffmpeg::{EncoderConfig, FfmpegEncoder};
use reverie_core::store::StatusStore;
use reverie_db::{PgSourceFetcher, PgStatusStore};
use reverie_openai::{OpenAiClient, OpenAiConfig};
use reverie_pipeline::{Collaborators, GenerationService, PipelineConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reverie_api::background;
use reverie_api::config::ServerConfig;
use reverie_api::router::build_app_router;
use reverie_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "reverie_api=debug,reverie_pipeline=debug,reverie_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        ceiling_secs = pipeline_config.ceiling.as_secs(),
        cache_ttl_secs = pipeline_config.cache_ttl.as_secs(),
        "Loaded pipeline configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = reverie_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    reverie_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    reverie_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let openai = Arc::new(OpenAiClient::new(OpenAiConfig::from_env()));
    let artifacts = Arc::new(S3ArtifactStore::from_config(StorageConfig::from_env()).await);
    tracing::info!("Artifact storage configured");

    let cards = CardRenderer::new(CardConfig::from_env()).expect("Failed to load caption font");

    let collaborators = Collaborators {
        source: Arc::new(PgSourceFetcher::new(
            pool.clone(),
            pipeline_config.source_char_budget,
        )),
        text: openai.clone(),
        image: openai.clone(),
        speech: openai,
        encoder: Arc::new(FfmpegEncoder::new(EncoderConfig::from_env())),
        artifacts,
        cards: Arc::new(cards),
    };

    let store: Arc<dyn StatusStore> = Arc::new(PgStatusStore::new(pool));
    let generations = GenerationService::new(pipeline_config, collaborators, store);

    // Records left in flight by a previous process can never finish.
    match generations.reconcile_stale().await {
        Ok(failed) => tracing::info!(failed, "Startup reconciliation complete"),
        Err(e) => tracing::error!(error = %e, "Startup reconciliation failed"),
    }

    // --- Background jobs ---
    let reconcile_cancel = CancellationToken::new();
    let reconcile_handle = tokio::spawn(background::reconciliation::run(
        generations.clone(),
        Duration::from_secs(config.reconcile_interval_secs),
        reconcile_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        generations,
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    reconcile_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), reconcile_handle).await;
    tracing::info!("Reconciliation job stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
