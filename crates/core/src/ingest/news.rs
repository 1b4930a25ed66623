use crate::config::Settings;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const PAGE_SIZE: usize = 10;
const KEEP_TOP: usize = 5;
const LOOKBACK_DAYS: i64 = 7;

const POSITIVE_KEYWORDS: &[&str] = &[
    "surge", "boom", "adoption", "growth", "positive", "bullish", "rally", "gain",
];
const NEGATIVE_KEYWORDS: &[&str] = &[
    "crash",
    "ban",
    "regulation",
    "crackdown",
    "bearish",
    "decline",
    "fall",
    "risk",
];

#[async_trait::async_trait]
pub trait NewsClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Most recent articles matching `query`, newest first, at most five.
    async fn search(&self, query: &str, now: DateTime<Utc>) -> Result<Vec<NewsArticle>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub source: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsArticle {
    pub fn sentiment(&self) -> f64 {
        classify_sentiment(&format!("{} {}", self.title, self.description))
    }
}

/// Keyword vote over a headline: 0.7 when positive words win, 0.3 when negative words win,
/// 0.5 on a tie.
pub fn classify_sentiment(text: &str) -> f64 {
    let text = text.to_lowercase();
    let positive = POSITIVE_KEYWORDS
        .iter()
        .filter(|k| text.contains(*k))
        .count();
    let negative = NEGATIVE_KEYWORDS
        .iter()
        .filter(|k| text.contains(*k))
        .count();

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => 0.7,
        std::cmp::Ordering::Less => 0.3,
        std::cmp::Ordering::Equal => 0.5,
    }
}

#[derive(Debug, Clone)]
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl NewsApiClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = std::env::var("NEWS_API_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("NEWS_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(
            base_url,
            settings.news_api_key.clone(),
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build NewsAPI http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl NewsClient for NewsApiClient {
    fn provider_name(&self) -> &'static str {
        "newsapi"
    }

    async fn search(&self, query: &str, now: DateTime<Utc>) -> Result<Vec<NewsArticle>> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!(query, "NEWS_API_KEY not set; skipping news search");
            return Ok(Vec::new());
        };

        let from = (now - ChronoDuration::days(LOOKBACK_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let page_size = PAGE_SIZE.to_string();

        let res = self
            .http
            .get(format!("{}/everything", self.base_url.trim_end_matches('/')))
            .query(&[
                ("q", query),
                ("apiKey", api_key),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("from", from.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("NewsAPI request failed for query {query:?}"))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("NewsAPI HTTP {status}: {body}");
        }

        let parsed: EverythingResponse = res
            .json()
            .await
            .context("failed to decode NewsAPI response")?;

        Ok(parsed
            .articles
            .into_iter()
            .take(KEEP_TOP)
            .map(RawArticle::into_article)
            .collect())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSource {
    #[serde(default)]
    name: Option<String>,
}

impl RawArticle {
    fn into_article(self) -> NewsArticle {
        NewsArticle {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            source: self
                .source
                .and_then(|s| s.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            url: self.url.unwrap_or_default(),
            published_at: self
                .published_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}
