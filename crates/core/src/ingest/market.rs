use crate::config::Settings;
use crate::domain::profile::MarketMetrics;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DESCRIPTION_MAX_CHARS: usize = 500;

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Best match for a free-text asset name or symbol.
    async fn search_asset(&self, query: &str) -> Result<Option<CoinHit>>;

    /// Full market details for a provider coin id. `None` if the provider doesn't know it.
    async fn asset_details(&self, coin_id: &str) -> Result<Option<CoinDetails>>;
}

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = std::env::var("COINGECKO_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("COINGECKO_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(
            base_url,
            settings.coingecko_api_key.clone(),
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build CoinGecko http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-cg-pro-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl MarketDataClient for CoinGeckoClient {
    fn provider_name(&self) -> &'static str {
        "coingecko"
    }

    async fn search_asset(&self, query: &str) -> Result<Option<CoinHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let res = self
            .http
            .get(self.url("/search"))
            .headers(self.headers()?)
            .query(&[("query", query)])
            .send()
            .await
            .context("CoinGecko search request failed")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("CoinGecko search HTTP {status}: {body}");
        }

        let parsed: SearchResponse = res
            .json()
            .await
            .context("failed to decode CoinGecko search response")?;
        Ok(parsed.coins.into_iter().next())
    }

    async fn asset_details(&self, coin_id: &str) -> Result<Option<CoinDetails>> {
        let res = self
            .http
            .get(self.url(&format!("/coins/{coin_id}")))
            .headers(self.headers()?)
            .query(&[
                ("localization", "false"),
                ("tickers", "false"),
                ("community_data", "false"),
                ("developer_data", "false"),
            ])
            .send()
            .await
            .context("CoinGecko coin details request failed")?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("CoinGecko coin details HTTP {status}: {body}");
        }

        let parsed: CoinDetails = res
            .json()
            .await
            .with_context(|| format!("failed to decode CoinGecko details for {coin_id}"))?;
        Ok(Some(parsed))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<CoinHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinHit {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoinDetails {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub image: Option<CoinImage>,
    #[serde(default)]
    pub description: Option<CoinDescription>,
    #[serde(default)]
    pub market_data: Option<CoinMarketData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinImage {
    #[serde(default)]
    pub large: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinDescription {
    #[serde(default)]
    pub en: Option<String>,
}

/// Price-like fields come keyed by quote currency; only USD is used.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UsdQuote {
    #[serde(default)]
    pub usd: Option<f64>,
}

fn usd(q: &Option<UsdQuote>) -> Option<f64> {
    q.and_then(|q| q.usd)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinMarketData {
    #[serde(default)]
    pub current_price: Option<UsdQuote>,
    #[serde(default)]
    pub market_cap: Option<UsdQuote>,
    #[serde(default)]
    pub total_volume: Option<UsdQuote>,
    #[serde(default)]
    pub ath: Option<UsdQuote>,
    #[serde(default)]
    pub ath_change_percentage: Option<UsdQuote>,
    #[serde(default)]
    pub high_24h: Option<UsdQuote>,
    #[serde(default)]
    pub low_24h: Option<UsdQuote>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_7d: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_30d: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub circulating_supply: Option<f64>,
    #[serde(default)]
    pub total_supply: Option<f64>,
}

/// Market figures shown next to an analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub current_price: f64,
    pub market_cap: f64,
    pub total_volume: f64,
    pub price_change_24h: f64,
    pub price_change_7d: f64,
    pub price_change_30d: f64,
    pub market_cap_rank: Option<u32>,
    pub ath: f64,
    pub ath_change_percentage: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub circulating_supply: f64,
    pub total_supply: f64,
}

impl CoinDetails {
    pub fn metrics(&self) -> Option<MarketMetrics> {
        let md = self.market_data.as_ref()?;
        Some(MarketMetrics {
            price_change_24h_pct: md.price_change_percentage_24h,
            price_change_7d_pct: md.price_change_percentage_7d,
            market_cap_usd: usd(&md.market_cap),
            total_volume_usd: usd(&md.total_volume),
            market_cap_rank: md.market_cap_rank.or(self.market_cap_rank),
        })
    }

    pub fn snapshot(&self) -> Option<MarketSnapshot> {
        let md = self.market_data.as_ref()?;
        Some(MarketSnapshot {
            current_price: usd(&md.current_price).unwrap_or(0.0),
            market_cap: usd(&md.market_cap).unwrap_or(0.0),
            total_volume: usd(&md.total_volume).unwrap_or(0.0),
            price_change_24h: md.price_change_percentage_24h.unwrap_or(0.0),
            price_change_7d: md.price_change_percentage_7d.unwrap_or(0.0),
            price_change_30d: md.price_change_percentage_30d.unwrap_or(0.0),
            market_cap_rank: md.market_cap_rank.or(self.market_cap_rank),
            ath: usd(&md.ath).unwrap_or(0.0),
            ath_change_percentage: usd(&md.ath_change_percentage).unwrap_or(0.0),
            high_24h: usd(&md.high_24h).unwrap_or(0.0),
            low_24h: usd(&md.low_24h).unwrap_or(0.0),
            circulating_supply: md.circulating_supply.unwrap_or(0.0),
            total_supply: md.total_supply.unwrap_or(0.0),
        })
    }

    pub fn image_url(&self) -> String {
        self.image
            .as_ref()
            .and_then(|i| i.large.clone())
            .unwrap_or_default()
    }

    /// English description, cut to a display-friendly length on a char boundary.
    pub fn short_description(&self) -> String {
        self.description
            .as_ref()
            .and_then(|d| d.en.as_deref())
            .unwrap_or_default()
            .chars()
            .take(DESCRIPTION_MAX_CHARS)
            .collect()
    }
}
