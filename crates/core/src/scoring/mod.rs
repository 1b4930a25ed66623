//! Influence scoring.
//!
//! Every event contributes `weight(dimension) × severity × sentiment × recency × attention`,
//! all factors clamped to [0, 1]. Each horizon averages the contributions of the events inside
//! its age window and pulls the neutral 0.5 towards that average by the horizon's trust weight:
//!
//! ```text
//! p = clamp(0.5 + w × (mean − 0.5), 0, 1)      w = 0.6 / 0.3 / 0.1
//! ```
//!
//! The engine never fails. Out-of-range inputs are clamped and an empty window reads as
//! neutral with low confidence.

use crate::domain::event::{EventDimension, MacroEvent};
use crate::domain::profile::SensitivityProfile;
use crate::domain::report::{ConfidenceLevel, Horizon, HorizonProbabilities};
use chrono::{DateTime, Utc};
use serde::Serialize;

const NEUTRAL: f64 = 0.5;
const HIGH_CONFIDENCE_MIN_EVENTS: usize = 6;
const MEDIUM_CONFIDENCE_MIN_EVENTS: usize = 3;
const HIGH_CONFIDENCE_MAX_STDDEV: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventContribution {
    /// Index into the event slice that was scored.
    pub event_index: usize,
    pub dimension: EventDimension,
    pub age_days: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HorizonScore {
    pub horizon: Horizon,
    pub probability: f64,
    pub event_count: usize,
    pub mean_contribution: f64,
    pub stddev: f64,
    pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringOutcome {
    pub probabilities: HorizonProbabilities,
    /// Weakest of the per-horizon confidences.
    pub confidence: ConfidenceLevel,
    pub horizons: [HorizonScore; 3],
    pub contributions: Vec<EventContribution>,
}

impl ScoringOutcome {
    pub fn horizon(&self, horizon: Horizon) -> &HorizonScore {
        match horizon {
            Horizon::Short => &self.horizons[0],
            Horizon::Medium => &self.horizons[1],
            Horizon::Long => &self.horizons[2],
        }
    }

    /// Contributions feeding the given horizon, in event order.
    pub fn contributing(&self, horizon: Horizon) -> impl Iterator<Item = &EventContribution> + '_ {
        self.contributions
            .iter()
            .filter(move |c| horizon.includes_age(c.age_days))
    }
}

/// Scores `events` against `profile` as of `as_of`.
pub fn score(
    profile: &SensitivityProfile,
    events: &[MacroEvent],
    as_of: DateTime<Utc>,
) -> ScoringOutcome {
    let profile = profile.clamped();

    let contributions: Vec<EventContribution> = events
        .iter()
        .enumerate()
        .map(|(event_index, event)| EventContribution {
            event_index,
            dimension: event.dimension,
            age_days: event.age_days(as_of),
            value: contribution(&profile, event),
        })
        .collect();

    let horizons = Horizon::ALL.map(|horizon| {
        let values: Vec<f64> = contributions
            .iter()
            .filter(|c| horizon.includes_age(c.age_days))
            .map(|c| c.value)
            .collect();
        score_horizon(horizon, &values)
    });

    let confidence = horizons
        .iter()
        .map(|h| h.confidence)
        .min()
        .unwrap_or(ConfidenceLevel::Low);

    ScoringOutcome {
        probabilities: HorizonProbabilities {
            short_term: horizons[0].probability,
            medium_term: horizons[1].probability,
            long_term: horizons[2].probability,
        },
        confidence,
        horizons,
        contributions,
    }
}

/// Influence of a single event, always in [0, 1].
pub fn contribution(profile: &SensitivityProfile, event: &MacroEvent) -> f64 {
    let weight = unit(profile.weight_for(event.dimension));
    weight
        * unit(event.severity)
        * unit(event.sentiment)
        * unit(event.recency)
        * unit(event.attention)
}

/// Blends the mean contribution into the neutral midpoint. An empty window is neutral.
pub fn horizon_probability(weight: f64, contributions: &[f64]) -> f64 {
    let Some(mean) = mean(contributions) else {
        return NEUTRAL;
    };
    unit(NEUTRAL + unit(weight) * (mean - NEUTRAL))
}

pub fn confidence_for(contributions: &[f64]) -> ConfidenceLevel {
    let n = contributions.len();
    if n >= HIGH_CONFIDENCE_MIN_EVENTS && stddev(contributions) < HIGH_CONFIDENCE_MAX_STDDEV {
        ConfidenceLevel::High
    } else if n >= MEDIUM_CONFIDENCE_MIN_EVENTS {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

fn score_horizon(horizon: Horizon, values: &[f64]) -> HorizonScore {
    HorizonScore {
        horizon,
        probability: round4(horizon_probability(horizon.weight(), values)),
        event_count: values.len(),
        mean_contribution: mean(values).unwrap_or(0.0),
        stddev: stddev(values),
        confidence: confidence_for(values),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// Population standard deviation; 0 for fewer than two values.
fn stddev(values: &[f64]) -> f64 {
    let Some(m) = mean(values) else {
        return 0.0;
    };
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn event(dimension: EventDimension, scores: [f64; 4], age_days: i64) -> MacroEvent {
        MacroEvent {
            dimension,
            description: format!("{dimension} event"),
            source: "test".to_string(),
            severity: scores[0],
            sentiment: scores[1],
            recency: scores[2],
            attention: scores[3],
            occurred_at: as_of() - Duration::days(age_days),
        }
    }

    fn reference_profile() -> SensitivityProfile {
        SensitivityProfile::new(0.8, 0.6, 0.4, 0.3, 0.5)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_events_are_neutral_and_low_confidence() {
        let outcome = score(&reference_profile(), &[], as_of());
        assert_eq!(outcome.probabilities, HorizonProbabilities::NEUTRAL);
        assert_eq!(outcome.confidence, ConfidenceLevel::Low);
        assert!(outcome.contributions.is_empty());
    }

    #[test]
    fn single_volatility_event_scenario() {
        let events = [event(EventDimension::Volatility, [0.9, 0.9, 1.0, 0.8], 5)];
        let outcome = score(&reference_profile(), &events, as_of());

        assert_close(outcome.contributions[0].value, 0.5184);
        assert_close(outcome.probabilities.short_term, 0.5110);
        assert_close(outcome.probabilities.medium_term, 0.5055);
        assert_close(outcome.probabilities.long_term, 0.5018);
        assert_eq!(outcome.confidence, ConfidenceLevel::Low);
    }

    #[test]
    fn unclassified_event_uses_average_weight() {
        let profile = reference_profile();
        let e = event(EventDimension::Unclassified, [1.0, 1.0, 1.0, 1.0], 0);
        assert_close(contribution(&profile, &e), profile.average());
    }

    #[test]
    fn contributions_stay_in_unit_interval_for_wild_inputs() {
        let profile = SensitivityProfile {
            volatility: 7.0,
            liquidity: -3.0,
            regulation: f64::NAN,
            interest_rate: f64::INFINITY,
            geopolitical: 0.5,
        };
        let wild = [1e9, -1e9, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.0, 0.3, 1.0];
        for dimension in [
            EventDimension::Volatility,
            EventDimension::Liquidity,
            EventDimension::Regulation,
            EventDimension::InterestRate,
            EventDimension::Geopolitical,
            EventDimension::Unclassified,
        ] {
            for &x in &wild {
                let e = event(dimension, [x, 1.0 - x, x, 0.9], 1);
                let c = contribution(&profile, &e);
                assert!((0.0..=1.0).contains(&c), "{dimension} with {x} gave {c}");
            }
        }
    }

    #[test]
    fn probabilities_stay_in_unit_interval() {
        assert_eq!(horizon_probability(5.0, &[1e6]), 1.0);
        assert_eq!(horizon_probability(5.0, &[-1e6]), 0.0);

        let events: Vec<_> = (0..12)
            .map(|i| event(EventDimension::Volatility, [40.0, 40.0, 40.0, 40.0], i * 20))
            .collect();
        let outcome = score(&SensitivityProfile::new(9.0, 9.0, 9.0, 9.0, 9.0), &events, as_of());
        for h in Horizon::ALL {
            let p = outcome.probabilities.get(h);
            assert!((0.0..=1.0).contains(&p), "{h} = {p}");
        }
    }

    #[test]
    fn windows_widen_with_horizon() {
        let events = [
            event(EventDimension::Volatility, [1.0, 1.0, 1.0, 1.0], 2),
            event(EventDimension::Volatility, [1.0, 1.0, 1.0, 1.0], 90),
            event(EventDimension::Volatility, [1.0, 1.0, 1.0, 1.0], 400),
        ];
        let outcome = score(&reference_profile(), &events, as_of());
        assert_eq!(outcome.horizon(Horizon::Short).event_count, 1);
        assert_eq!(outcome.horizon(Horizon::Medium).event_count, 2);
        assert_eq!(outcome.horizon(Horizon::Long).event_count, 3);
        assert_eq!(outcome.contributing(Horizon::Medium).count(), 2);
    }

    #[test]
    fn never_high_confidence_below_six_events_in_a_window() {
        // Plenty of long-window evidence, but only five fresh events.
        let mut events: Vec<_> = (0..5)
            .map(|_| event(EventDimension::Regulation, [0.5, 0.5, 0.5, 0.5], 1))
            .collect();
        events.extend((0..10).map(|_| event(EventDimension::Regulation, [0.5, 0.5, 0.5, 0.5], 365)));

        let outcome = score(&reference_profile(), &events, as_of());
        assert_eq!(outcome.horizon(Horizon::Long).confidence, ConfidenceLevel::High);
        assert_ne!(outcome.confidence, ConfidenceLevel::High);

        for n in 0..6 {
            let values = vec![0.4; n];
            assert_ne!(confidence_for(&values), ConfidenceLevel::High, "n = {n}");
        }
    }

    #[test]
    fn confidence_tiers() {
        assert_eq!(confidence_for(&[0.5; 6]), ConfidenceLevel::High);
        // Wide spread keeps six events at Medium.
        assert_eq!(
            confidence_for(&[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]),
            ConfidenceLevel::Medium
        );
        assert_eq!(confidence_for(&[0.1, 0.2, 0.3]), ConfidenceLevel::Medium);
        assert_eq!(confidence_for(&[0.1, 0.2]), ConfidenceLevel::Low);
    }

    #[test]
    fn raising_severity_never_lowers_probability() {
        let profile = reference_profile();
        let others = [
            event(EventDimension::Regulation, [0.4, 0.3, 0.9, 0.7], 3),
            event(EventDimension::Geopolitical, [0.8, 0.6, 0.5, 0.6], 40),
        ];

        let mut previous: Option<HorizonProbabilities> = None;
        for step in 0..=10 {
            let severity = step as f64 / 10.0;
            let mut events = others.to_vec();
            events.push(event(EventDimension::Volatility, [severity, 0.8, 1.0, 0.9], 10));
            let p = score(&profile, &events, as_of()).probabilities;
            if let Some(prev) = previous {
                assert!(p.short_term >= prev.short_term);
                assert!(p.medium_term >= prev.medium_term);
                assert!(p.long_term >= prev.long_term);
            }
            previous = Some(p);
        }
    }

    #[test]
    fn future_dated_events_count_as_fresh() {
        let events = [event(EventDimension::Liquidity, [1.0, 1.0, 1.0, 1.0], -3)];
        let outcome = score(&reference_profile(), &events, as_of());
        assert_eq!(outcome.contributions[0].age_days, 0);
        assert_eq!(outcome.horizon(Horizon::Short).event_count, 1);
    }
}
