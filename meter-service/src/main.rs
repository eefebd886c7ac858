use anyhow::Result;
use meter_service::{
    api::{self, AppState},
    config::AppConfig,
    gemini::GeminiClient,
    metrics_server, observability, store,
};
use std::{net::SocketAddr, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = store::open_store(&cfg.store).await?;
    let generator = GeminiClient::new(&cfg.gemini)?;

    let state = Arc::new(AppState {
        store,
        generator: Arc::new(generator),
        policy: cfg.validation.clone(),
        max_image_bytes: cfg.http.max_image_bytes,
        letter_language: cfg.gemini.letter_language.clone(),
    });
    let app = api::router(state);

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "meter service listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("meter service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
