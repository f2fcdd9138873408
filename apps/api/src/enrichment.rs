//! Market-data enrichment — optional RapidAPI-backed salary/demand signals.
//!
//! Enrichment is best-effort ground truth: when a figure comes back it
//! overrides whatever generation or fallback produced, but a failed or
//! unconfigured fetch must never abort a comparison. Every failure path
//! here collapses to `None`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

const RAPIDAPI_BASE_URL: &str = "https://career-market-data.p.rapidapi.com";
const RAPIDAPI_HOST: &str = "career-market-data.p.rapidapi.com";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Aggregate market signals for one role in one location.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketStats {
    pub avg_salary: Option<f64>,
    pub demand_score: Option<f64>,
    pub currency: Option<String>,
}

/// The enrichment collaborator. Carried in `AppState` as
/// `Arc<dyn MarketDataSource>` so tests can swap in a fake.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Fetches market stats for `subject` in `location`.
    /// Returns `None` on any failure or when unconfigured.
    async fn fetch(&self, subject: &str, location: &str) -> Option<MarketStats>;
}

/// RapidAPI-backed implementation.
pub struct RapidApiMarketData {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl RapidApiMarketData {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url: base_url.unwrap_or_else(|| RAPIDAPI_BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl MarketDataSource for RapidApiMarketData {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, subject: &str, location: &str) -> Option<MarketStats> {
        let api_key = self.api_key.as_ref()?;

        let response = self
            .client
            .get(format!("{}/market-stats", self.base_url))
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .query(&[("role", subject), ("location", location)])
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Enrichment fetch for '{subject}' returned {}", r.status());
                return None;
            }
            Err(e) => {
                warn!("Enrichment fetch for '{subject}' failed: {e}");
                return None;
            }
        };

        match response.json::<MarketStats>().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Enrichment payload for '{subject}' was malformed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_fetch_is_none() {
        let source = RapidApiMarketData::new(None, None);
        assert!(!source.is_configured());
        assert!(source.fetch("Data Scientist", "Pune").await.is_none());
    }

    #[test]
    fn test_market_stats_tolerates_partial_payloads() {
        let stats: MarketStats = serde_json::from_str(r#"{"avg_salary": 900000}"#).unwrap();
        assert_eq!(stats.avg_salary, Some(900000.0));
        assert!(stats.demand_score.is_none());
        assert!(stats.currency.is_none());
    }
}
