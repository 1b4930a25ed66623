use crate::config::Settings;
use crate::domain::event::MacroEvent;
use crate::domain::profile::SensitivityProfile;
use crate::domain::report::{outlook_phrase, Horizon, HorizonProbabilities, Narratives};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::ollama::OllamaClient;
use crate::llm::{CompletionRequest, LlmClient};
use crate::scoring::ScoringOutcome;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 45;
const PROMPT_EVENT_LIMIT: usize = 5;
const EVENT_DESCRIPTION_MAX_CHARS: usize = 100;
const TEMPERATURE: f32 = 0.7;

const EXPLAIN_SYSTEM: &str =
    "You are a patient financial educator who explains complex topics simply.";
const SCENARIO_SYSTEM: &str = "You are a financial analyst writing scenario analysis.";
const SCENARIO_FALLBACK: &str = "Based on current macro conditions, the asset faces mixed pressures across different time horizons.";

/// Turns scores into prose. The model only explains numbers it is given; it never scores.
///
/// Every call is bounded by a timeout and falls back to a templated sentence, so narration
/// can't fail an analysis.
#[derive(Clone)]
pub struct Narrator {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl Narrator {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout_secs = std::env::var("NARRATIVE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let client = OllamaClient::from_settings(settings)?;
        Ok(Self::new(Arc::new(client), Duration::from_secs(timeout_secs)))
    }

    /// Three horizon explanations plus the overall scenario, requested concurrently.
    pub async fn narrate(
        &self,
        asset_name: &str,
        profile: &SensitivityProfile,
        events: &[MacroEvent],
        outcome: &ScoringOutcome,
    ) -> (Narratives, String) {
        let for_horizon = move |h: Horizon| {
            let relevant = contributing_events(events, outcome, h);
            async move {
                self.explain(asset_name, profile, h, outcome.probabilities.get(h), &relevant)
                    .await
            }
        };

        let (short, medium, long, scenario) = tokio::join!(
            for_horizon(Horizon::Short),
            for_horizon(Horizon::Medium),
            for_horizon(Horizon::Long),
            self.most_likely_scenario(asset_name, &outcome.probabilities, events),
        );

        (
            Narratives {
                short,
                medium,
                long,
            },
            scenario,
        )
    }

    pub async fn explain(
        &self,
        asset_name: &str,
        profile: &SensitivityProfile,
        horizon: Horizon,
        probability: f64,
        events: &[&MacroEvent],
    ) -> String {
        let req = CompletionRequest {
            system: EXPLAIN_SYSTEM.to_string(),
            prompt: horizon_prompt(asset_name, profile, horizon, probability, events),
            max_tokens: 200,
            temperature: TEMPERATURE,
        };

        self.ask(req, horizon.as_str())
            .await
            .unwrap_or_else(|| horizon_fallback(horizon, probability))
    }

    pub async fn most_likely_scenario(
        &self,
        asset_name: &str,
        probabilities: &HorizonProbabilities,
        events: &[MacroEvent],
    ) -> String {
        let events: Vec<&MacroEvent> = events.iter().take(PROMPT_EVENT_LIMIT).collect();
        let req = CompletionRequest {
            system: SCENARIO_SYSTEM.to_string(),
            prompt: scenario_prompt(asset_name, probabilities, &events),
            max_tokens: 250,
            temperature: TEMPERATURE,
        };

        self.ask(req, "scenario")
            .await
            .unwrap_or_else(|| SCENARIO_FALLBACK.to_string())
    }

    async fn ask(&self, req: CompletionRequest, purpose: &'static str) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.client.complete(req)).await {
            Ok(Ok(text)) => {
                let text = clean_output(&text);
                (!text.is_empty()).then_some(text)
            }
            Ok(Err(e)) => {
                if let Some(diag) = e.downcast_ref::<LlmDiagnosticsError>() {
                    tracing::warn!(
                        purpose,
                        stage = diag.stage,
                        detail = %diag.detail,
                        raw_output = ?diag.output_excerpt(300),
                        "narrative generation failed; using fallback"
                    );
                } else {
                    tracing::warn!(
                        purpose,
                        error = %format!("{e:#}"),
                        "narrative generation failed; using fallback"
                    );
                }
                None
            }
            Err(_) => {
                tracing::warn!(
                    purpose,
                    timeout_secs = self.timeout.as_secs(),
                    "narrative generation timed out; using fallback"
                );
                None
            }
        }
    }
}

/// Events inside the horizon's window, strongest contribution first, at most five.
fn contributing_events<'a>(
    events: &'a [MacroEvent],
    outcome: &ScoringOutcome,
    horizon: Horizon,
) -> Vec<&'a MacroEvent> {
    let mut scored: Vec<_> = outcome
        .contributing(horizon)
        .filter_map(|c| events.get(c.event_index).map(|e| (c.value, e)))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(PROMPT_EVENT_LIMIT)
        .map(|(_, e)| e)
        .collect()
}

pub fn horizon_fallback(horizon: Horizon, probability: f64) -> String {
    format!(
        "The {}-term outlook shows a probability of {:.2}, suggesting {} conditions.",
        horizon.as_str(),
        probability,
        outlook_phrase(probability)
    )
}

fn sensitivity_level(weight: f64) -> &'static str {
    if weight > 0.7 {
        "High"
    } else if weight > 0.4 {
        "Medium"
    } else {
        "Low"
    }
}

fn summarize_sensitivities(profile: &SensitivityProfile) -> String {
    profile
        .entries()
        .iter()
        .map(|(dim, w)| format!("- {}: {} ({w:.2})", dim.label(), sensitivity_level(*w)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_events(events: &[&MacroEvent]) -> String {
    if events.is_empty() {
        return "- No significant macro events in recent period".to_string();
    }
    events
        .iter()
        .take(PROMPT_EVENT_LIMIT)
        .map(|e| {
            let description: String = e
                .description
                .chars()
                .take(EVENT_DESCRIPTION_MAX_CHARS)
                .collect();
            format!("- {}: {}", e.dimension.label(), description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn horizon_prompt(
    asset_name: &str,
    profile: &SensitivityProfile,
    horizon: Horizon,
    probability: f64,
    events: &[&MacroEvent],
) -> String {
    format!(
        "You are a financial analyst explaining macro influence analysis to a beginner.\n\n\
Asset: {asset_name}\n\
Time Horizon: {h}-term ({range})\n\
Calculated Probability Score: {probability:.2} (on scale 0-1, where 0.5 is neutral)\n\
Outlook: {outlook}\n\n\
Asset Sensitivity Profile:\n{sensitivities}\n\n\
Recent Macro Events:\n{events}\n\n\
Task: Write a 2-3 sentence explanation in plain English that:\n\
1. Explains what the {probability:.2} score means for {asset_name}\n\
2. References the most relevant macro events\n\
3. Uses simple language, no jargon\n\
4. Sounds like a teacher explaining to a student\n\n\
Do not recalculate anything. Just explain the provided score.",
        h = horizon.as_str(),
        range = horizon.range_label(),
        outlook = outlook_phrase(probability),
        sensitivities = summarize_sensitivities(profile),
        events = summarize_events(events),
    )
}

fn scenario_prompt(
    asset_name: &str,
    probabilities: &HorizonProbabilities,
    events: &[&MacroEvent],
) -> String {
    format!(
        "Based on this macro analysis for {asset_name}:\n\n\
Short-term probability: {:.2}\n\
Medium-term probability: {:.2}\n\
Long-term probability: {:.2}\n\n\
Key macro events:\n{}\n\n\
Write a single paragraph (3-4 sentences) describing the most likely scenario for this asset \
over the next 6 months. Use simple language and be specific about what might happen.",
        probabilities.short_term,
        probabilities.medium_term,
        probabilities.long_term,
        summarize_events(events),
    )
}

/// Strips wrapping quotes and markdown fences some local models add around plain answers.
fn clean_output(text: &str) -> String {
    let mut s = text.trim();
    if let Some(inner) = s.strip_prefix("```") {
        let inner = inner.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        s = inner.strip_suffix("```").unwrap_or(inner).trim();
    }
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s = s[1..s.len() - 1].trim();
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventDimension;
    use crate::llm::Provider;
    use crate::scoring;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::Mutex;

    enum Behaviour {
        Echo,
        Fail,
        Hang,
    }

    struct StubLlm {
        behaviour: Behaviour,
        prompts: Mutex<Vec<String>>,
    }

    impl StubLlm {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for StubLlm {
        fn provider(&self) -> Provider {
            Provider::Ollama
        }

        async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(req.prompt.clone());
            match self.behaviour {
                Behaviour::Echo => Ok(format!("\"narrative for {} tokens\"", req.max_tokens)),
                Behaviour::Fail => Err(LlmDiagnosticsError::empty(Provider::Ollama).into()),
                Behaviour::Hang => {
                    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    fn profile() -> SensitivityProfile {
        SensitivityProfile::new(0.8, 0.6, 0.4, 0.3, 0.5)
    }

    fn events() -> Vec<MacroEvent> {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        vec![
            MacroEvent {
                dimension: EventDimension::InterestRate,
                description: "Federal funds rate at 4.5%, trend rising".to_string(),
                source: "FRED".to_string(),
                severity: 0.7,
                sentiment: 0.4,
                recency: 1.0,
                attention: 0.8,
                occurred_at: now,
            },
            MacroEvent {
                dimension: EventDimension::Regulation,
                description: "x".repeat(300),
                source: "Wire".to_string(),
                severity: 0.6,
                sentiment: 0.7,
                recency: 0.5,
                attention: 0.7,
                occurred_at: now - ChronoDuration::days(60),
            },
        ]
    }

    fn outcome(events: &[MacroEvent]) -> ScoringOutcome {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        scoring::score(&profile(), events, now)
    }

    #[tokio::test]
    async fn narrate_uses_model_output_and_cleans_it() {
        let llm = StubLlm::new(Behaviour::Echo);
        let narrator = Narrator::new(llm.clone(), Duration::from_secs(5));
        let events = events();

        let (narratives, scenario) = narrator
            .narrate("Bitcoin", &profile(), &events, &outcome(&events))
            .await;

        assert_eq!(narratives.short, "narrative for 200 tokens");
        assert_eq!(scenario, "narrative for 250 tokens");

        let prompts = llm.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 4);
        let short = prompts
            .iter()
            .find(|p| p.contains("Time Horizon: short-term (0-4 weeks)"))
            .unwrap();
        // The 60-day-old headline is outside the short window.
        assert!(short.contains("- Interest Rate: Federal funds rate"));
        assert!(!short.contains("xxxxxxxxxx"));
        assert!(short.contains("- Volatility: High (0.80)"));
        assert!(short.contains("- Regulation: Low (0.40)"));

        let long = prompts
            .iter()
            .find(|p| p.contains("Time Horizon: long-term (6-24 months)"))
            .unwrap();
        assert!(long.contains(&format!("- Regulation: {}", "x".repeat(100))));
        assert!(!long.contains(&"x".repeat(101)));
    }

    #[tokio::test]
    async fn failures_fall_back_to_templates() {
        let narrator = Narrator::new(StubLlm::new(Behaviour::Fail), Duration::from_secs(5));
        let events = events();
        let outcome = outcome(&events);

        let (narratives, scenario) = narrator
            .narrate("Bitcoin", &profile(), &events, &outcome)
            .await;

        assert_eq!(
            narratives.medium,
            horizon_fallback(Horizon::Medium, outcome.probabilities.medium_term)
        );
        assert_eq!(scenario, SCENARIO_FALLBACK);
    }

    #[tokio::test]
    async fn slow_model_times_out_to_fallback() {
        let narrator = Narrator::new(StubLlm::new(Behaviour::Hang), Duration::from_millis(50));
        let text = narrator
            .explain("Bitcoin", &profile(), Horizon::Long, 0.25, &[])
            .await;
        assert_eq!(
            text,
            "The long-term outlook shows a probability of 0.25, suggesting negative conditions."
        );
    }

    #[test]
    fn empty_event_summary_says_so() {
        assert_eq!(
            summarize_events(&[]),
            "- No significant macro events in recent period"
        );
    }

    #[test]
    fn sensitivity_levels() {
        assert_eq!(sensitivity_level(0.71), "High");
        assert_eq!(sensitivity_level(0.7), "Medium");
        assert_eq!(sensitivity_level(0.41), "Medium");
        assert_eq!(sensitivity_level(0.4), "Low");
    }

    #[test]
    fn clean_output_strips_quotes_and_fences() {
        assert_eq!(clean_output("  \"quoted\"  "), "quoted");
        assert_eq!(clean_output("```text\nhello\n```"), "hello");
        assert_eq!(clean_output("plain"), "plain");
        assert_eq!(clean_output("\""), "\"");
    }
}
