use crate::config::Settings;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const OBSERVATION_LIMIT: usize = 12;

pub const FED_FUNDS_SERIES: &str = "FEDFUNDS";
pub const CPI_SERIES: &str = "CPIAUCSL";

#[async_trait::async_trait]
pub trait EconomicDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn interest_rate(&self) -> Result<Option<InterestRateReading>>;

    async fn inflation(&self) -> Result<Option<InflationReading>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateTrend {
    Rising,
    Falling,
    Stable,
}

impl RateTrend {
    pub fn between(previous: f64, current: f64) -> Self {
        if current > previous {
            RateTrend::Rising
        } else if current < previous {
            RateTrend::Falling
        } else {
            RateTrend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateTrend::Rising => "rising",
            RateTrend::Falling => "falling",
            RateTrend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRateReading {
    pub current_rate: f64,
    pub previous_rate: Option<f64>,
    pub trend: RateTrend,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InflationReading {
    pub current_cpi: f64,
    pub year_ago_cpi: f64,
    /// Year-over-year change in percent, rounded to 2 dp.
    pub yoy_inflation: f64,
    pub date: NaiveDate,
}

/// FRED series observations, newest first.
#[derive(Debug, Clone)]
pub struct FredClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FredClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = std::env::var("FRED_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("FRED_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(
            base_url,
            settings.fred_api_key.clone(),
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build FRED http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Latest observations for a series, newest first, with missing values dropped.
    /// Without an API key there is nothing to fetch and the result is empty.
    async fn observations(&self, series_id: &str) -> Result<Vec<Observation>> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!(series_id, "FRED_API_KEY not set; skipping indicator");
            return Ok(Vec::new());
        };

        let url = format!(
            "{}/series/observations",
            self.base_url.trim_end_matches('/')
        );
        let limit = OBSERVATION_LIMIT.to_string();
        let res = self
            .http
            .get(url)
            .query(&[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("FRED request for {series_id} failed"))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("FRED HTTP {status} for {series_id}: {body}");
        }

        let parsed: ObservationsResponse = res
            .json()
            .await
            .with_context(|| format!("failed to decode FRED observations for {series_id}"))?;

        Ok(parsed
            .observations
            .into_iter()
            .filter_map(|o| o.parse())
            .collect())
    }
}

#[async_trait::async_trait]
impl EconomicDataClient for FredClient {
    fn provider_name(&self) -> &'static str {
        "fred"
    }

    async fn interest_rate(&self) -> Result<Option<InterestRateReading>> {
        let obs = self.observations(FED_FUNDS_SERIES).await?;
        Ok(interest_rate_from(&obs))
    }

    async fn inflation(&self) -> Result<Option<InflationReading>> {
        let obs = self.observations(CPI_SERIES).await?;
        Ok(inflation_from(&obs))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<RawObservation>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

impl RawObservation {
    // FRED reports gaps as ".".
    fn parse(self) -> Option<Observation> {
        let value = self.value.trim().parse::<f64>().ok()?;
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()?;
        Some(Observation { date, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Observation {
    date: NaiveDate,
    value: f64,
}

fn interest_rate_from(obs: &[Observation]) -> Option<InterestRateReading> {
    let latest = obs.first()?;
    let previous = obs.get(1).map(|o| o.value);
    Some(InterestRateReading {
        current_rate: latest.value,
        previous_rate: previous,
        trend: previous.map_or(RateTrend::Stable, |p| RateTrend::between(p, latest.value)),
        date: latest.date,
    })
}

fn inflation_from(obs: &[Observation]) -> Option<InflationReading> {
    if obs.len() < OBSERVATION_LIMIT {
        return None;
    }
    let latest = obs[0];
    let year_ago = obs[OBSERVATION_LIMIT - 1];
    if year_ago.value == 0.0 {
        return None;
    }
    let yoy = (latest.value - year_ago.value) / year_ago.value * 100.0;
    Some(InflationReading {
        current_cpi: latest.value,
        year_ago_cpi: year_ago.value,
        yoy_inflation: (yoy * 100.0).round() / 100.0,
        date: latest.date,
    })
}
