//! imgix Rewrite API Server
//! Serves WordPress media through an imgix source by rewriting image URLs

mod attachment;
mod config;
mod content_scanner;
mod error;
mod filename_size;
mod handlers;
mod host_rewriter;
mod params;
mod retina;
mod rewriter;
mod settings;
mod sizes;
mod url_parts;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/rewrite/url", post(handlers::rewrite_url))
        .route("/api/v1/rewrite/content", post(handlers::rewrite_content))
        .route("/api/v1/rewrite/content/bulk", post(handlers::rewrite_content_bulk))
        .route("/api/v1/rewrite/response", post(handlers::filter_response))
        .route("/api/v1/rewrite/downsize", post(handlers::rewrite_downsize))
        .route("/api/v1/rewrite/srcset", post(handlers::rewrite_srcset))
        .route("/api/v1/dns-prefetch", post(handlers::dns_prefetch))
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config first so RUST_LOG can come from .env
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "imgix_rewrite_api=debug,info".into()),
        ))
        .init();

    let config = config::Config::from_env();
    if config.api_key.is_none() {
        tracing::warn!("API_KEY is not set, rewrite endpoints will refuse every request");
    }

    tracing::info!("Starting imgix rewrite API on {}", config.address());

    let state = AppState {
        api_key: config.api_key.clone(),
    };
    let app = router(state).layer(DefaultBodyLimit::max(config.max_body_bytes));

    let listener = tokio::net::TcpListener::bind(config.address())
        .await
        .with_context(|| format!("Failed to bind {}", config.address()))?;

    tracing::info!("Server listening on http://{}", config.address());

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
