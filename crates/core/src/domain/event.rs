use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk dimension an event acts on. Tags we don't recognise land in `Unclassified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDimension {
    Volatility,
    Liquidity,
    Regulation,
    InterestRate,
    Geopolitical,
    #[serde(other)]
    Unclassified,
}

impl EventDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventDimension::Volatility => "volatility",
            EventDimension::Liquidity => "liquidity",
            EventDimension::Regulation => "regulation",
            EventDimension::InterestRate => "interest_rate",
            EventDimension::Geopolitical => "geopolitical",
            EventDimension::Unclassified => "unclassified",
        }
    }

    /// Human label, e.g. "Interest Rate".
    pub fn label(&self) -> &'static str {
        match self {
            EventDimension::Volatility => "Volatility",
            EventDimension::Liquidity => "Liquidity",
            EventDimension::Regulation => "Regulation",
            EventDimension::InterestRate => "Interest Rate",
            EventDimension::Geopolitical => "Geopolitical",
            EventDimension::Unclassified => "General",
        }
    }
}

impl fmt::Display for EventDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored macro or news occurrence. Scores are nominally in [0, 1]; the engine clamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroEvent {
    pub dimension: EventDimension,
    pub description: String,
    pub source: String,
    pub severity: f64,
    pub sentiment: f64,
    pub recency: f64,
    pub attention: f64,
    pub occurred_at: DateTime<Utc>,
}

impl MacroEvent {
    /// Whole days between the event and `as_of`. Events stamped in the future count as age 0.
    pub fn age_days(&self, as_of: DateTime<Utc>) -> i64 {
        (as_of - self.occurred_at).num_days().max(0)
    }
}
