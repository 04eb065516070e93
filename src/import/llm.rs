use crate::models::{ColumnRole, Scope};
use log::warn;
use serde_json::json;
use std::time::Duration;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

/// One parsed answer from an external column analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAnalysis {
    pub role: ColumnRole,
    pub scope: Option<Scope>,
    pub unit: Option<String>,
    pub confidence: f64,
}

/// Pluggable strategy for classifying columns the local rules cannot place.
/// Implementations may fail arbitrarily; `None` means "no usable answer" and
/// the classifier falls back to its defaults.
pub trait ColumnAnalyzer {
    fn classify_column(&self, name: &str, samples: &[String]) -> Option<ColumnAnalysis>;
}

/// Chat-completions-backed analyzer. Constructed only when a credential is
/// present in the environment; every network or parse failure degrades to
/// `None`.
pub struct OpenAiColumnAnalyzer {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl OpenAiColumnAnalyzer {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            model: "gpt-4o".to_string(),
        }
    }

    /// `None` when `OPENAI_API_KEY` is absent or empty; the adapter is then
    /// a no-op for the whole ingestion.
    pub fn from_env() -> Option<Self> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Self::new)
    }

    fn build_prompt(name: &str, samples: &[String]) -> String {
        let mut prompt = format!(
            "Analyze this column from an emissions data spreadsheet and classify it into one of \
             these categories: 'fuel', 'electricity', 'transport', 'waste', 'water', \
             'refrigerant', 'amount', 'unit', 'date', 'category', 'notes', 'location'.\n\n\
             Column name: '{}'",
            name
        );
        let sample_str = samples
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if !sample_str.is_empty() {
            prompt.push_str(&format!("\nSample values: {}", sample_str));
        }
        prompt.push_str(
            "\n\nRespond in JSON format with these fields: 'category' (one of the categories \
             listed above), 'scope' (1, 2, or 3, or null if not applicable), 'unit' (the \
             measurement unit if detectable, or null), 'confidence' (0-1 score of confidence in \
             the classification).",
        );
        prompt
    }
}

impl ColumnAnalyzer for OpenAiColumnAnalyzer {
    fn classify_column(&self, name: &str, samples: &[String]) -> Option<ColumnAnalysis> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": Self::build_prompt(name, samples)}],
            "response_format": {"type": "json_object"},
        });

        let response = match self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
        {
            Ok(r) => r,
            Err(e) => {
                warn!("column analysis request failed for '{}': {}", name, e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(
                "column analysis for '{}' returned status {}",
                name,
                response.status()
            );
            return None;
        }

        let envelope: serde_json::Value = match response.json() {
            Ok(v) => v,
            Err(e) => {
                warn!("column analysis response for '{}' is not JSON: {}", name, e);
                return None;
            }
        };
        let content = envelope
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())?;
        parse_analysis(content)
    }
}

/// Defensive parse of an analyzer answer. Anything that does not resolve to
/// the closed role vocabulary is discarded.
pub(crate) fn parse_analysis(content: &str) -> Option<ColumnAnalysis> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    let role = value
        .get("category")
        .and_then(|v| v.as_str())
        .and_then(ColumnRole::parse)?;
    let scope = value
        .get("scope")
        .and_then(|v| v.as_u64())
        .and_then(|n| u8::try_from(n).ok())
        .and_then(Scope::from_number);
    let unit = value
        .get("unit")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty());
    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);
    Some(ColumnAnalysis {
        role,
        scope,
        unit,
        confidence,
    })
}

/// Deterministic analyzer used in tests: answers from a fixed list keyed by
/// column name.
#[cfg(test)]
pub(crate) struct StubAnalyzer {
    pub answers: Vec<(String, ColumnAnalysis)>,
}

#[cfg(test)]
impl ColumnAnalyzer for StubAnalyzer {
    fn classify_column(&self, name: &str, _samples: &[String]) -> Option<ColumnAnalysis> {
        self.answers
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, analysis)| analysis.clone())
    }
}
