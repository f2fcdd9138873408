use std::sync::Arc;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::enrichment::MarketDataSource;
use crate::llm_client::LlmClient;
use crate::rate_limit::RateLimiter;

/// Shared application state injected into all route handlers via Axum
/// extractors. Every collaborator is constructed once at startup and
/// passed in explicitly — no module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub cache: TtlCache,
    pub rate_limiter: RateLimiter,
    pub llm: Arc<LlmClient>,
    /// Pluggable market-data source. Default: RapidApiMarketData; tests
    /// swap in fakes through this seam.
    pub market: Arc<dyn MarketDataSource>,
    pub config: Config,
}
