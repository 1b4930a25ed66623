use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Analysis window. Shorter horizons only see fresher events and trust them more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Short,
    Medium,
    Long,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Short, Horizon::Medium, Horizon::Long];

    pub fn weight(&self) -> f64 {
        match self {
            Horizon::Short => 0.6,
            Horizon::Medium => 0.3,
            Horizon::Long => 0.1,
        }
    }

    /// Oldest event age (in days) that still feeds this horizon. `None` means unbounded.
    pub fn max_age_days(&self) -> Option<i64> {
        match self {
            Horizon::Short => Some(30),
            Horizon::Medium => Some(180),
            Horizon::Long => None,
        }
    }

    pub fn includes_age(&self, age_days: i64) -> bool {
        self.max_age_days().map_or(true, |max| age_days <= max)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::Short => "short",
            Horizon::Medium => "medium",
            Horizon::Long => "long",
        }
    }

    pub fn range_label(&self) -> &'static str {
        match self {
            Horizon::Short => "0-4 weeks",
            Horizon::Medium => "1-6 months",
            Horizon::Long => "6-24 months",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonProbabilities {
    pub short_term: f64,
    pub medium_term: f64,
    pub long_term: f64,
}

impl HorizonProbabilities {
    pub const NEUTRAL: HorizonProbabilities = HorizonProbabilities {
        short_term: 0.5,
        medium_term: 0.5,
        long_term: 0.5,
    };

    pub fn get(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::Short => self.short_term,
            Horizon::Medium => self.medium_term,
            Horizon::Long => self.long_term,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narratives {
    pub short: String,
    pub medium: String,
    pub long: String,
}

impl Narratives {
    pub fn get(&self, horizon: Horizon) -> &str {
        match horizon {
            Horizon::Short => &self.short,
            Horizon::Medium => &self.medium,
            Horizon::Long => &self.long,
        }
    }
}

/// Ordered so that `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::High => "High",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidenceLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "High" | "high" => Ok(ConfidenceLevel::High),
            "Medium" | "medium" => Ok(ConfidenceLevel::Medium),
            "Low" | "low" => Ok(ConfidenceLevel::Low),
            other => anyhow::bail!("unknown confidence level: {other}"),
        }
    }
}

/// Everything needed to persist a freshly computed analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub owner_id: Uuid,
    pub token_name: String,
    pub probabilities: HorizonProbabilities,
    pub narratives: Narratives,
    pub most_likely_scenario: String,
    pub confidence: ConfidenceLevel,
    pub macro_events_analyzed: i32,
}

impl NewReport {
    pub fn into_report(self, id: Uuid, created_at: DateTime<Utc>) -> Report {
        Report {
            id,
            owner_id: self.owner_id,
            token_name: self.token_name,
            probabilities: self.probabilities,
            narratives: self.narratives,
            most_likely_scenario: self.most_likely_scenario,
            confidence: self.confidence,
            macro_events_analyzed: self.macro_events_analyzed,
            pdf_path: None,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub token_name: String,
    pub probabilities: HorizonProbabilities,
    pub narratives: Narratives,
    pub most_likely_scenario: String,
    pub confidence: ConfidenceLevel,
    pub macro_events_analyzed: i32,
    pub pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: Uuid,
    pub token_name: String,
    pub short_term_prob: f64,
    pub medium_term_prob: f64,
    pub long_term_prob: f64,
    pub confidence_level: ConfidenceLevel,
    pub created_at: DateTime<Utc>,
}

/// Qualitative reading of a probability used in narratives.
pub fn outlook_phrase(probability: f64) -> &'static str {
    if probability > 0.7 {
        "strongly positive"
    } else if probability > 0.6 {
        "moderately positive"
    } else if probability > 0.4 {
        "neutral to slightly positive"
    } else if probability > 0.3 {
        "neutral to slightly negative"
    } else {
        "negative"
    }
}

/// Table label used in the PDF probability summary.
pub fn interpretation_label(probability: f64) -> &'static str {
    if probability > 0.7 {
        "Strongly Positive"
    } else if probability > 0.6 {
        "Moderately Positive"
    } else if probability > 0.4 {
        "Neutral"
    } else if probability > 0.3 {
        "Moderately Negative"
    } else {
        "Strongly Negative"
    }
}
