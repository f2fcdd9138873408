mod cache;
mod comparison;
mod config;
mod enrichment;
mod errors;
mod llm_client;
mod rate_limit;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::TtlCache;
use crate::config::Config;
use crate::enrichment::{MarketDataSource, RapidApiMarketData};
use crate::llm_client::LlmClient;
use crate::rate_limit::RateLimiter;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pathfinder API v{}", env!("CARGO_PKG_VERSION"));

    let cache = TtlCache::new(Duration::from_secs(config.cache_ttl_secs));
    info!("Comparison cache initialized (ttl: {}s)", config.cache_ttl_secs);

    let rate_limiter = RateLimiter::new(
        config.rate_limit_max_requests,
        Duration::from_secs(config.rate_limit_window_secs),
    );
    info!(
        "Rate limiter initialized ({} requests / {}s window)",
        config.rate_limit_max_requests, config.rate_limit_window_secs
    );

    let llm = Arc::new(LlmClient::new(
        config.provider,
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
    ));
    if llm.is_configured() {
        info!(
            "LLM client initialized (provider: {}, model: {})",
            llm.provider_name(),
            llm.model_name()
        );
    } else {
        info!("No LLM API key configured — comparisons will use deterministic fallback");
    }

    let market: Arc<dyn MarketDataSource> = Arc::new(RapidApiMarketData::new(
        config.rapidapi_key.clone(),
        config.rapidapi_base_url.clone(),
    ));
    if !market.is_configured() {
        info!("No RapidAPI key configured — enrichment disabled");
    }

    let state = AppState {
        cache,
        rate_limiter,
        llm,
        market,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
