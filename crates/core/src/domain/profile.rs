use crate::domain::event::EventDimension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-asset weights for the five macro risk dimensions, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityProfile {
    pub volatility: f64,
    pub liquidity: f64,
    pub regulation: f64,
    pub interest_rate: f64,
    pub geopolitical: f64,
}

impl SensitivityProfile {
    /// Builds a profile with every weight clamped into [0, 1]. NaN becomes 0.
    pub fn new(
        volatility: f64,
        liquidity: f64,
        regulation: f64,
        interest_rate: f64,
        geopolitical: f64,
    ) -> Self {
        Self {
            volatility: unit(volatility),
            liquidity: unit(liquidity),
            regulation: unit(regulation),
            interest_rate: unit(interest_rate),
            geopolitical: unit(geopolitical),
        }
    }

    pub fn clamped(&self) -> Self {
        Self::new(
            self.volatility,
            self.liquidity,
            self.regulation,
            self.interest_rate,
            self.geopolitical,
        )
    }

    pub fn average(&self) -> f64 {
        (self.volatility + self.liquidity + self.regulation + self.interest_rate + self.geopolitical)
            / 5.0
    }

    /// Weight applied to an event of the given dimension. `Unclassified` uses the mean weight.
    pub fn weight_for(&self, dimension: EventDimension) -> f64 {
        match dimension {
            EventDimension::Volatility => self.volatility,
            EventDimension::Liquidity => self.liquidity,
            EventDimension::Regulation => self.regulation,
            EventDimension::InterestRate => self.interest_rate,
            EventDimension::Geopolitical => self.geopolitical,
            EventDimension::Unclassified => self.average(),
        }
    }

    pub fn entries(&self) -> [(EventDimension, f64); 5] {
        [
            (EventDimension::Volatility, self.volatility),
            (EventDimension::Liquidity, self.liquidity),
            (EventDimension::Regulation, self.regulation),
            (EventDimension::InterestRate, self.interest_rate),
            (EventDimension::Geopolitical, self.geopolitical),
        ]
    }

    /// Derives a profile from live market figures.
    ///
    /// Volatile assets are treated as more sensitive to rates and geopolitics, thinly traded
    /// ones as more liquidity-sensitive, and small caps (large rank numbers) as more exposed to
    /// regulation.
    pub fn from_market_metrics(metrics: &MarketMetrics) -> Self {
        let volatility = volatility_score(metrics.price_change_24h_pct, metrics.price_change_7d_pct);
        let liquidity = liquidity_score(metrics.market_cap_usd, metrics.total_volume_usd);
        let rank = metrics.market_cap_rank.unwrap_or(DEFAULT_MARKET_CAP_RANK);

        Self::new(
            volatility,
            1.0 - liquidity,
            (rank as f64 / 100.0).min(1.0),
            volatility * 0.8,
            volatility * 0.6,
        )
    }
}

const DEFAULT_MARKET_CAP_RANK: u32 = 1000;

/// The handful of market figures the profile derivation needs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketMetrics {
    pub price_change_24h_pct: Option<f64>,
    pub price_change_7d_pct: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub total_volume_usd: Option<f64>,
    pub market_cap_rank: Option<u32>,
}

/// Average absolute move over 24h and 7d, normalised so a 50% swing saturates at 1.
pub fn volatility_score(change_24h_pct: Option<f64>, change_7d_pct: Option<f64>) -> f64 {
    let a = change_24h_pct.filter(|v| v.is_finite()).unwrap_or(0.0).abs();
    let b = change_7d_pct.filter(|v| v.is_finite()).unwrap_or(0.0).abs();
    ((a + b) / 2.0 / 50.0).min(1.0)
}

/// Volume-to-market-cap ratio, normalised so a 10% daily turnover saturates at 1.
pub fn liquidity_score(market_cap_usd: Option<f64>, total_volume_usd: Option<f64>) -> f64 {
    let cap = market_cap_usd.filter(|v| v.is_finite()).unwrap_or(0.0);
    let volume = total_volume_usd.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0);
    if cap <= 0.0 {
        return 0.0;
    }
    (volume / cap / 0.1).min(1.0)
}

/// Where the profile of an analysis run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    Custom,
    MarketData,
    DefaultTable,
}

/// A known asset in the built-in table.
#[derive(Debug, Clone, Copy)]
pub struct KnownAsset {
    pub symbol: &'static str,
    pub name: &'static str,
    pub profile: SensitivityProfile,
}

const fn known(
    symbol: &'static str,
    name: &'static str,
    weights: [f64; 5],
) -> KnownAsset {
    KnownAsset {
        symbol,
        name,
        profile: SensitivityProfile {
            volatility: weights[0],
            liquidity: weights[1],
            regulation: weights[2],
            interest_rate: weights[3],
            geopolitical: weights[4],
        },
    }
}

// volatility, liquidity, regulation, interest_rate, geopolitical
const KNOWN_ASSETS: &[KnownAsset] = &[
    known("BTC", "Bitcoin", [0.6, 0.2, 0.4, 0.6, 0.5]),
    known("ETH", "Ethereum", [0.7, 0.3, 0.5, 0.6, 0.4]),
    known("USDT", "Tether", [0.1, 0.2, 0.9, 0.4, 0.3]),
    known("USDC", "USD Coin", [0.1, 0.2, 0.8, 0.5, 0.2]),
    known("BNB", "BNB", [0.6, 0.4, 0.8, 0.5, 0.5]),
    known("XRP", "XRP", [0.7, 0.4, 0.9, 0.4, 0.4]),
    known("SOL", "Solana", [0.8, 0.4, 0.5, 0.6, 0.4]),
    known("ADA", "Cardano", [0.7, 0.5, 0.5, 0.5, 0.3]),
    known("DOGE", "Dogecoin", [0.9, 0.5, 0.4, 0.5, 0.3]),
    known("AVAX", "Avalanche", [0.8, 0.5, 0.5, 0.6, 0.3]),
    known("DOT", "Polkadot", [0.8, 0.6, 0.5, 0.5, 0.3]),
    known("LINK", "Chainlink", [0.8, 0.5, 0.5, 0.5, 0.3]),
];

/// Looks up a built-in profile by ticker symbol or asset name, case-insensitively.
pub fn default_profile(symbol_or_name: &str) -> Option<&'static KnownAsset> {
    let needle = symbol_or_name.trim();
    if needle.is_empty() {
        return None;
    }
    KNOWN_ASSETS
        .iter()
        .find(|a| a.symbol.eq_ignore_ascii_case(needle) || a.name.eq_ignore_ascii_case(needle))
}

/// A user-entered profile for an asset the market data provider doesn't know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomProfile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub token_name: String,
    pub token_type: Option<String>,
    pub profile: SensitivityProfile,
    pub created_at: DateTime<Utc>,
}

fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
