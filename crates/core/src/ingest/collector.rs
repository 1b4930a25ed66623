use crate::domain::event::{EventDimension, MacroEvent};
use crate::ingest::economic::{EconomicDataClient, InflationReading, InterestRateReading, RateTrend};
use crate::ingest::news::{NewsArticle, NewsClient};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

pub const MAX_EVENTS: usize = 20;
const GEOPOLITICAL_ARTICLE_CAP: usize = 10;
const RECENCY_HALF_LIFE_DAYS: f64 = 14.0;

pub const GEOPOLITICAL_QUERIES: [&str; 4] = [
    "central bank policy",
    "trade war",
    "financial regulation",
    "economic sanctions",
];

/// An asset headline with the sentiment the collector assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsSource {
    pub title: String,
    pub source: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub sentiment: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MacroReadings {
    pub interest_rate: Option<InterestRateReading>,
    pub inflation: Option<InflationReading>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectedEvents {
    pub events: Vec<MacroEvent>,
    pub readings: MacroReadings,
    pub news_sources: Vec<NewsSource>,
}

/// Gathers macro events for one asset from the economic and news providers.
///
/// Provider failures never fail the collection; the affected source just contributes nothing.
#[derive(Clone)]
pub struct EventCollector {
    economic: Arc<dyn EconomicDataClient>,
    news: Arc<dyn NewsClient>,
}

impl EventCollector {
    pub fn new(economic: Arc<dyn EconomicDataClient>, news: Arc<dyn NewsClient>) -> Self {
        Self { economic, news }
    }

    pub async fn fetch_events(&self, asset_name: &str, now: DateTime<Utc>) -> CollectedEvents {
        let asset_query = format!("{asset_name} cryptocurrency");
        let (interest_rate, inflation, asset_news, geopolitical_news) = tokio::join!(
            self.interest_rate(),
            self.inflation(),
            self.search_news(&asset_query, now),
            self.geopolitical_news(now),
        );

        let mut events = Vec::new();
        if let Some(reading) = &interest_rate {
            events.push(interest_rate_event(reading, now));
        }
        if let Some(reading) = &inflation {
            events.push(inflation_event(reading, now));
        }

        let mut news_sources = Vec::with_capacity(asset_news.len());
        for article in &asset_news {
            let sentiment = article.sentiment();
            news_sources.push(NewsSource {
                title: article.title.clone(),
                source: article.source.clone(),
                url: article.url.clone(),
                published_at: article.published_at,
                sentiment,
            });
            events.push(news_event(
                article,
                EventDimension::Regulation,
                0.6,
                0.7,
                sentiment,
                now,
            ));
        }
        for article in &geopolitical_news {
            events.push(news_event(
                article,
                EventDimension::Geopolitical,
                0.5,
                0.6,
                article.sentiment(),
                now,
            ));
        }

        if events.len() > MAX_EVENTS {
            tracing::debug!(
                total = events.len(),
                kept = MAX_EVENTS,
                "macro event list truncated"
            );
            events.truncate(MAX_EVENTS);
        }

        tracing::info!(
            asset = asset_name,
            events = events.len(),
            has_interest_rate = interest_rate.is_some(),
            has_inflation = inflation.is_some(),
            "macro events collected"
        );

        CollectedEvents {
            events,
            readings: MacroReadings {
                interest_rate,
                inflation,
            },
            news_sources,
        }
    }

    async fn interest_rate(&self) -> Option<InterestRateReading> {
        match self.economic.interest_rate().await {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!(
                    provider = self.economic.provider_name(),
                    error = %format!("{e:#}"),
                    "interest rate fetch failed; continuing without it"
                );
                None
            }
        }
    }

    async fn inflation(&self) -> Option<InflationReading> {
        match self.economic.inflation().await {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!(
                    provider = self.economic.provider_name(),
                    error = %format!("{e:#}"),
                    "inflation fetch failed; continuing without it"
                );
                None
            }
        }
    }

    async fn search_news(&self, query: &str, now: DateTime<Utc>) -> Vec<NewsArticle> {
        match self.news.search(query, now).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!(
                    provider = self.news.provider_name(),
                    query,
                    error = %format!("{e:#}"),
                    "news search failed; continuing without it"
                );
                Vec::new()
            }
        }
    }

    async fn geopolitical_news(&self, now: DateTime<Utc>) -> Vec<NewsArticle> {
        let batches = join_all(
            GEOPOLITICAL_QUERIES
                .iter()
                .map(|q| self.search_news(q, now)),
        )
        .await;

        dedup_by_url(batches.into_iter().flatten(), GEOPOLITICAL_ARTICLE_CAP)
    }
}

/// Keeps the first article seen per URL, up to `cap` articles. Articles without a URL are kept.
fn dedup_by_url(articles: impl IntoIterator<Item = NewsArticle>, cap: usize) -> Vec<NewsArticle> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| a.url.is_empty() || seen.insert(a.url.clone()))
        .take(cap)
        .collect()
}

/// Exponential decay with a 14-day half-life. Future timestamps count as fresh.
pub fn recency_score(occurred_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = ((now - occurred_at).num_seconds() as f64 / 86_400.0).max(0.0);
    (-std::f64::consts::LN_2 * age_days / RECENCY_HALF_LIFE_DAYS)
        .exp()
        .clamp(0.0, 1.0)
}

fn interest_rate_event(reading: &InterestRateReading, now: DateTime<Utc>) -> MacroEvent {
    MacroEvent {
        dimension: EventDimension::InterestRate,
        description: format!(
            "Federal funds rate at {}%, trend {}",
            reading.current_rate,
            reading.trend.as_str()
        ),
        source: "FRED".to_string(),
        severity: 0.7,
        sentiment: if reading.trend == RateTrend::Rising {
            0.4
        } else {
            0.6
        },
        recency: 1.0,
        attention: 0.8,
        occurred_at: now,
    }
}

fn inflation_event(reading: &InflationReading, now: DateTime<Utc>) -> MacroEvent {
    MacroEvent {
        dimension: EventDimension::InterestRate,
        description: format!("Inflation at {}% year-over-year", reading.yoy_inflation),
        source: "FRED".to_string(),
        severity: (reading.yoy_inflation.abs() / 10.0).min(1.0),
        sentiment: if reading.yoy_inflation > 3.0 { 0.3 } else { 0.6 },
        recency: 1.0,
        attention: 0.7,
        occurred_at: now,
    }
}

fn news_event(
    article: &NewsArticle,
    dimension: EventDimension,
    severity: f64,
    attention: f64,
    sentiment: f64,
    now: DateTime<Utc>,
) -> MacroEvent {
    let occurred_at = article.published_at.unwrap_or(now);
    MacroEvent {
        dimension,
        description: article.title.clone(),
        source: article.source.clone(),
        severity,
        sentiment,
        recency: recency_score(occurred_at, now),
        attention,
        occurred_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::sync::Mutex;

    struct StubEconomic {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl EconomicDataClient for StubEconomic {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn interest_rate(&self) -> anyhow::Result<Option<InterestRateReading>> {
            anyhow::ensure!(!self.fail, "fred down");
            Ok(Some(InterestRateReading {
                current_rate: 4.5,
                previous_rate: Some(4.25),
                trend: RateTrend::Rising,
                date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            }))
        }

        async fn inflation(&self) -> anyhow::Result<Option<InflationReading>> {
            anyhow::ensure!(!self.fail, "fred down");
            Ok(Some(InflationReading {
                current_cpi: 320.0,
                year_ago_cpi: 310.0,
                yoy_inflation: 3.23,
                date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            }))
        }
    }

    struct StubNews {
        fail_asset: bool,
        queries: Mutex<Vec<String>>,
        per_query: usize,
        published_at: Option<DateTime<Utc>>,
    }

    impl StubNews {
        fn new(per_query: usize) -> Self {
            Self {
                fail_asset: false,
                queries: Mutex::new(Vec::new()),
                per_query,
                published_at: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl NewsClient for StubNews {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn search(&self, query: &str, _now: DateTime<Utc>) -> anyhow::Result<Vec<NewsArticle>> {
            self.queries.lock().unwrap().push(query.to_string());
            let is_asset = query.ends_with("cryptocurrency");
            anyhow::ensure!(!(is_asset && self.fail_asset), "news down");
            Ok((0..self.per_query)
                .map(|i| NewsArticle {
                    title: format!("{query} rally {i}"),
                    description: String::new(),
                    source: "Wire".to_string(),
                    // Geopolitical queries share URLs so dedup has something to do.
                    url: if is_asset {
                        format!("https://asset.test/{i}")
                    } else {
                        format!("https://world.test/{i}")
                    },
                    published_at: self.published_at,
                })
                .collect())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn builds_indicator_and_news_events() {
        let news = Arc::new(StubNews::new(2));
        let collector = EventCollector::new(Arc::new(StubEconomic { fail: false }), news.clone());

        let collected = collector.fetch_events("Solana", now()).await;

        // 2 indicators + 2 asset headlines + 2 deduped geopolitical headlines
        assert_eq!(collected.events.len(), 6);
        assert_eq!(collected.news_sources.len(), 2);
        assert_eq!(collected.news_sources[0].sentiment, 0.7);

        let rate = &collected.events[0];
        assert_eq!(rate.dimension, EventDimension::InterestRate);
        assert_eq!(rate.description, "Federal funds rate at 4.5%, trend rising");
        assert_eq!(rate.sentiment, 0.4);

        let inflation = &collected.events[1];
        assert_eq!(inflation.description, "Inflation at 3.23% year-over-year");
        assert_eq!(inflation.sentiment, 0.3);
        assert!((inflation.severity - 0.323).abs() < 1e-12);

        assert_eq!(collected.events[2].dimension, EventDimension::Regulation);
        assert_eq!(collected.events[5].dimension, EventDimension::Geopolitical);

        let queries = news.queries.lock().unwrap().clone();
        assert!(queries.contains(&"Solana cryptocurrency".to_string()));
        for q in GEOPOLITICAL_QUERIES {
            assert!(queries.contains(&q.to_string()));
        }
    }

    #[tokio::test]
    async fn provider_failures_degrade_to_empty() {
        let mut news = StubNews::new(1);
        news.fail_asset = true;
        let collector = EventCollector::new(Arc::new(StubEconomic { fail: true }), Arc::new(news));

        let collected = collector.fetch_events("Solana", now()).await;

        assert!(collected.readings.interest_rate.is_none());
        assert!(collected.readings.inflation.is_none());
        assert!(collected.news_sources.is_empty());
        // Only the single shared geopolitical URL survives.
        assert_eq!(collected.events.len(), 1);
    }

    #[tokio::test]
    async fn event_list_is_capped() {
        let collector = EventCollector::new(
            Arc::new(StubEconomic { fail: false }),
            Arc::new(StubNews::new(50)),
        );
        let collected = collector.fetch_events("Solana", now()).await;
        assert_eq!(collected.events.len(), MAX_EVENTS);
    }

    #[tokio::test]
    async fn news_events_use_publication_time() {
        let mut news = StubNews::new(1);
        news.published_at = Some(now() - Duration::days(14));
        let collector = EventCollector::new(Arc::new(StubEconomic { fail: true }), Arc::new(news));

        let collected = collector.fetch_events("Solana", now()).await;
        let headline = &collected.events[0];
        assert_eq!(headline.occurred_at, now() - Duration::days(14));
        assert!((headline.recency - 0.5).abs() < 1e-9);
    }

    #[test]
    fn recency_halves_every_two_weeks() {
        let n = now();
        assert_eq!(recency_score(n, n), 1.0);
        assert!((recency_score(n - Duration::days(28), n) - 0.25).abs() < 1e-9);
        assert_eq!(recency_score(n + Duration::days(3), n), 1.0);
    }

    #[test]
    fn dedup_keeps_first_url() {
        let a = |url: &str, title: &str| NewsArticle {
            title: title.to_string(),
            description: String::new(),
            source: "s".to_string(),
            url: url.to_string(),
            published_at: None,
        };
        let out = dedup_by_url(
            vec![a("u1", "first"), a("u1", "dup"), a("u2", "second"), a("u3", "third")],
            2,
        );
        assert_eq!(
            out.iter().map(|x| x.title.as_str()).collect::<Vec<_>>(),
            vec!["first", "second"]
        );
    }
}
