//! Main entry point for the Image Generation Hub

use image_gen_hub::{
    api,
    config::Settings,
    history::MemoryStore,
    orchestrator::{AdmissionGate, Orchestrator},
    upstream::GeminiClient,
    AppState,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));
    if settings.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    info!("Starting Image Generation Hub");

    // API key: explicit config first, then the conventional env vars
    let api_key = settings
        .upstream
        .api_key
        .clone()
        .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Missing API key. Set upstream.api_key, GOOGLE_API_KEY, or GEMINI_API_KEY"
            )
        })?;

    // Wire the orchestrator around the upstream client
    let client = Arc::new(GeminiClient::from_config(&settings.upstream, api_key)?);
    let gate = Arc::new(AdmissionGate::new(
        settings.upstream.max_concurrent,
        settings.upstream.min_interval(),
    ));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(Orchestrator::new(
        client,
        gate,
        settings.upstream.retry_policy(),
        store.clone(),
    ));

    info!(
        model = %settings.upstream.default_model,
        max_concurrent = settings.upstream.max_concurrent,
        min_interval_ms = settings.upstream.min_interval_ms,
        max_retries = settings.upstream.max_retries,
        "Upstream orchestrator configured"
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let app_state = Arc::new(AppState {
        settings,
        orchestrator,
        store,
    });

    // Build the router
    let app = api::routes::create_router(app_state);

    info!("Server listening on {}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
