//! One end-to-end analysis run: resolve the asset's sensitivity profile, collect macro events,
//! score them, then narrate the scores. Shared by the API and the worker CLI.

use crate::config::Settings;
use crate::domain::event::MacroEvent;
use crate::domain::profile::{default_profile, CustomProfile, ProfileSource, SensitivityProfile};
use crate::domain::report::{ConfidenceLevel, HorizonProbabilities, Narratives, NewReport};
use crate::ingest::collector::{EventCollector, MacroReadings, NewsSource};
use crate::ingest::economic::FredClient;
use crate::ingest::market::{CoinGeckoClient, MarketDataClient, MarketSnapshot};
use crate::ingest::news::NewsApiClient;
use crate::llm::narrative::Narrator;
use crate::scoring::{self, ScoringOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// The asset an analysis runs against, with the profile that drives scoring.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedAsset {
    pub name: String,
    pub symbol: String,
    pub profile: SensitivityProfile,
    pub source: ProfileSource,
    pub image: String,
    pub description: String,
    pub market_data: Option<MarketSnapshot>,
}

/// Profile weights as shown to users. Liquidity is inverted so higher reads as "more liquid".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorBreakdown {
    pub volatility: f64,
    pub liquidity: f64,
    pub regulation_exposure: f64,
    pub interest_rate_impact: f64,
    pub geopolitical_risk: f64,
}

impl FactorBreakdown {
    pub fn from_profile(p: &SensitivityProfile) -> Self {
        let r2 = |x: f64| (x * 100.0).round() / 100.0;
        Self {
            volatility: r2(p.volatility),
            liquidity: r2(1.0 - p.liquidity),
            regulation_exposure: r2(p.regulation),
            interest_rate_impact: r2(p.interest_rate),
            geopolitical_risk: r2(p.geopolitical),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub asset: ResolvedAsset,
    pub events: Vec<MacroEvent>,
    pub scoring: ScoringOutcome,
    pub narratives: Narratives,
    pub most_likely_scenario: String,
    pub readings: MacroReadings,
    pub news_sources: Vec<NewsSource>,
}

impl AnalysisOutcome {
    pub fn probabilities(&self) -> HorizonProbabilities {
        self.scoring.probabilities
    }

    pub fn confidence(&self) -> ConfidenceLevel {
        self.scoring.confidence
    }

    pub fn factor_breakdown(&self) -> FactorBreakdown {
        FactorBreakdown::from_profile(&self.asset.profile)
    }

    pub fn new_report(&self, owner_id: Uuid) -> NewReport {
        NewReport {
            owner_id,
            token_name: self.asset.name.clone(),
            probabilities: self.scoring.probabilities,
            narratives: self.narratives.clone(),
            most_likely_scenario: self.most_likely_scenario.clone(),
            confidence: self.scoring.confidence,
            macro_events_analyzed: i32::try_from(self.events.len()).unwrap_or(i32::MAX),
        }
    }
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    market: Arc<dyn MarketDataClient>,
    collector: EventCollector,
    narrator: Narrator,
}

impl AnalysisPipeline {
    pub fn new(market: Arc<dyn MarketDataClient>, collector: EventCollector, narrator: Narrator) -> Self {
        Self {
            market,
            collector,
            narrator,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let market = Arc::new(CoinGeckoClient::from_settings(settings)?);
        let collector = EventCollector::new(
            Arc::new(FredClient::from_settings(settings)?),
            Arc::new(NewsApiClient::from_settings(settings)?),
        );
        let narrator = Narrator::from_settings(settings)?;
        Ok(Self::new(market, collector, narrator))
    }

    /// Runs the whole analysis. `None` means no profile could be found for the asset and the
    /// caller should ask for a custom one.
    pub async fn run(
        &self,
        asset_name: &str,
        custom: Option<CustomProfile>,
        now: DateTime<Utc>,
    ) -> Option<AnalysisOutcome> {
        let asset = self.resolve_asset(asset_name, custom).await?;
        tracing::info!(
            asset = %asset.name,
            source = ?asset.source,
            "asset resolved"
        );

        let collected = self.collector.fetch_events(&asset.name, now).await;
        let scoring = scoring::score(&asset.profile, &collected.events, now);
        tracing::info!(
            asset = %asset.name,
            events = collected.events.len(),
            short = scoring.probabilities.short_term,
            medium = scoring.probabilities.medium_term,
            long = scoring.probabilities.long_term,
            confidence = %scoring.confidence,
            "scored"
        );

        let (narratives, most_likely_scenario) = self
            .narrator
            .narrate(&asset.name, &asset.profile, &collected.events, &scoring)
            .await;

        Some(AnalysisOutcome {
            asset,
            events: collected.events,
            scoring,
            narratives,
            most_likely_scenario,
            readings: collected.readings,
            news_sources: collected.news_sources,
        })
    }

    /// Custom profile first, then live market data, then the built-in table.
    pub async fn resolve_asset(
        &self,
        asset_name: &str,
        custom: Option<CustomProfile>,
    ) -> Option<ResolvedAsset> {
        if let Some(custom) = custom {
            return Some(ResolvedAsset {
                symbol: custom.token_name.to_uppercase(),
                name: custom.token_name,
                profile: custom.profile.clamped(),
                source: ProfileSource::Custom,
                image: String::new(),
                description: custom
                    .token_type
                    .map(|t| format!("Custom {t} profile"))
                    .unwrap_or_default(),
                market_data: None,
            });
        }

        if let Some(asset) = self.from_market_data(asset_name).await {
            return Some(asset);
        }

        default_profile(asset_name).map(|known| ResolvedAsset {
            name: known.name.to_string(),
            symbol: known.symbol.to_string(),
            profile: known.profile,
            source: ProfileSource::DefaultTable,
            image: String::new(),
            description: String::new(),
            market_data: None,
        })
    }

    async fn from_market_data(&self, asset_name: &str) -> Option<ResolvedAsset> {
        let provider = self.market.provider_name();
        let hit = match self.market.search_asset(asset_name).await {
            Ok(hit) => hit?,
            Err(e) => {
                tracing::warn!(provider, asset = asset_name, error = %format!("{e:#}"), "asset search failed");
                return None;
            }
        };

        let details = match self.market.asset_details(&hit.id).await {
            Ok(details) => details?,
            Err(e) => {
                tracing::warn!(provider, coin_id = %hit.id, error = %format!("{e:#}"), "asset details failed");
                return None;
            }
        };

        let Some(metrics) = details.metrics() else {
            tracing::debug!(provider, coin_id = %hit.id, "no market data for coin");
            return None;
        };

        Some(ResolvedAsset {
            name: details.name.clone(),
            symbol: details.symbol.to_uppercase(),
            profile: SensitivityProfile::from_market_metrics(&metrics),
            source: ProfileSource::MarketData,
            image: details.image_url(),
            description: details.short_description(),
            market_data: details.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventDimension;
    use crate::ingest::economic::{EconomicDataClient, InflationReading, InterestRateReading};
    use crate::ingest::market::{CoinDetails, CoinHit};
    use crate::ingest::news::{NewsArticle, NewsClient};
    use crate::llm::{CompletionRequest, LlmClient, Provider};
    use chrono::TimeZone;
    use serde_json::json;
    use std::time::Duration;

    struct StubMarket {
        details: Option<serde_json::Value>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl MarketDataClient for StubMarket {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn search_asset(&self, query: &str) -> anyhow::Result<Option<CoinHit>> {
            anyhow::ensure!(!self.fail, "market down");
            Ok(self.details.as_ref().map(|_| CoinHit {
                id: query.to_lowercase(),
                name: query.to_string(),
                symbol: "XYZ".to_string(),
                market_cap_rank: None,
            }))
        }

        async fn asset_details(&self, _coin_id: &str) -> anyhow::Result<Option<CoinDetails>> {
            Ok(self
                .details
                .clone()
                .map(serde_json::from_value)
                .transpose()?)
        }
    }

    struct NoEconomic;

    #[async_trait::async_trait]
    impl EconomicDataClient for NoEconomic {
        fn provider_name(&self) -> &'static str {
            "none"
        }
        async fn interest_rate(&self) -> anyhow::Result<Option<InterestRateReading>> {
            Ok(None)
        }
        async fn inflation(&self) -> anyhow::Result<Option<InflationReading>> {
            Ok(None)
        }
    }

    struct OneHeadline;

    #[async_trait::async_trait]
    impl NewsClient for OneHeadline {
        fn provider_name(&self) -> &'static str {
            "one"
        }
        async fn search(&self, query: &str, now: DateTime<Utc>) -> anyhow::Result<Vec<NewsArticle>> {
            if !query.ends_with("cryptocurrency") {
                return Ok(Vec::new());
            }
            Ok(vec![NewsArticle {
                title: "Institutional adoption boosts rally".to_string(),
                description: String::new(),
                source: "Wire".to_string(),
                url: "https://news.test/1".to_string(),
                published_at: Some(now),
            }])
        }
    }

    struct OfflineLlm;

    #[async_trait::async_trait]
    impl LlmClient for OfflineLlm {
        fn provider(&self) -> Provider {
            Provider::Ollama
        }
        async fn complete(&self, _req: CompletionRequest) -> anyhow::Result<String> {
            anyhow::bail!("offline")
        }
    }

    fn pipeline(market: StubMarket) -> AnalysisPipeline {
        AnalysisPipeline::new(
            Arc::new(market),
            EventCollector::new(Arc::new(NoEconomic), Arc::new(OneHeadline)),
            Narrator::new(Arc::new(OfflineLlm), Duration::from_secs(1)),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn coin_json() -> serde_json::Value {
        json!({
            "id": "solana",
            "name": "Solana",
            "symbol": "sol",
            "image": {"large": "https://img.test/sol.png"},
            "description": {"en": "Fast chain."},
            "market_data": {
                "current_price": {"usd": 150.0},
                "market_cap": {"usd": 1.0e9},
                "total_volume": {"usd": 5.0e7},
                "price_change_percentage_24h": -5.0,
                "price_change_percentage_7d": 15.0,
                "market_cap_rank": 20
            }
        })
    }

    #[tokio::test]
    async fn market_data_profile_is_derived_and_scored() {
        let p = pipeline(StubMarket {
            details: Some(coin_json()),
            fail: false,
        });

        let out = p.run("solana", None, now()).await.unwrap();
        assert_eq!(out.asset.source, ProfileSource::MarketData);
        assert_eq!(out.asset.name, "Solana");
        assert_eq!(out.asset.symbol, "SOL");
        assert!((out.asset.profile.volatility - 0.2).abs() < 1e-12);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].dimension, EventDimension::Regulation);
        assert_eq!(out.news_sources.len(), 1);
        assert_eq!(out.confidence(), ConfidenceLevel::Low);
        assert!(out.narratives.short.starts_with("The short-term outlook shows a probability of"));

        let breakdown = out.factor_breakdown();
        assert_eq!(breakdown.liquidity, 0.5);
        assert_eq!(breakdown.regulation_exposure, 0.2);

        let owner = Uuid::new_v4();
        let report = out.new_report(owner);
        assert_eq!(report.owner_id, owner);
        assert_eq!(report.token_name, "Solana");
        assert_eq!(report.macro_events_analyzed, 1);
        assert_eq!(report.probabilities, out.probabilities());
    }

    #[tokio::test]
    async fn custom_profile_wins_over_market_data() {
        let p = pipeline(StubMarket {
            details: Some(coin_json()),
            fail: false,
        });
        let custom = CustomProfile {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            token_name: "MyToken".to_string(),
            token_type: Some("governance".to_string()),
            profile: SensitivityProfile::new(0.9, 0.9, 0.9, 0.9, 0.9),
            created_at: now(),
        };

        let asset = p.resolve_asset("mytoken", Some(custom)).await.unwrap();
        assert_eq!(asset.source, ProfileSource::Custom);
        assert_eq!(asset.name, "MyToken");
        assert_eq!(asset.description, "Custom governance profile");
    }

    #[tokio::test]
    async fn market_outage_falls_back_to_default_table() {
        let p = pipeline(StubMarket {
            details: None,
            fail: true,
        });
        let asset = p.resolve_asset("eth", None).await.unwrap();
        assert_eq!(asset.source, ProfileSource::DefaultTable);
        assert_eq!(asset.name, "Ethereum");
    }

    #[tokio::test]
    async fn unknown_asset_requires_a_profile() {
        let p = pipeline(StubMarket {
            details: None,
            fail: false,
        });
        assert!(p.run("definitely-not-listed", None, now()).await.is_none());
    }

    #[test]
    fn factor_breakdown_rounds_and_inverts_liquidity() {
        let b = FactorBreakdown::from_profile(&SensitivityProfile::new(0.666, 0.25, 0.4, 0.3, 0.5));
        assert_eq!(
            b,
            FactorBreakdown {
                volatility: 0.67,
                liquidity: 0.75,
                regulation_exposure: 0.4,
                interest_rate_impact: 0.3,
                geopolitical_risk: 0.5,
            }
        );
    }
}
