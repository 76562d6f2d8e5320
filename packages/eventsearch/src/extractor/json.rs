//! Parsing and repair of LLM JSON output.
//!
//! Upstream models wrap JSON in code fences, leave trailing commas, and
//! emit literal `"value" or null` fragments. The repair pass is textual
//! and runs before parsing; a parse failure after repair returns `None`
//! without further LLM calls.

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

/// The extractor's view of one LLM reply, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_sub_type: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Some models use "description" instead of "summary"
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub perpetrator: Option<String>,
    #[serde(default)]
    pub perpetrator_type: Option<String>,
    #[serde(default)]
    pub location: Option<serde_json::Value>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub individuals: Option<Vec<String>>,
    #[serde(default)]
    pub organizations: Option<Vec<String>>,
    #[serde(default)]
    pub casualties: Option<serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Error indicators some models emit instead of an event
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub no_event: Option<bool>,
}

impl RawEvent {
    /// Summary with the description fallback applied.
    pub fn summary_text(&self) -> String {
        self.summary
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_default()
    }

    /// Whether the model explicitly signalled there is no event here.
    pub fn signals_no_event(&self) -> bool {
        self.error.as_ref().map(|e| !e.is_null()).unwrap_or(false)
            || self.no_event.unwrap_or(false)
    }
}

fn strip_fences(response: &str) -> &str {
    let trimmed = response.trim();
    for fence in ["```json", "```"] {
        if let Some(rest) = trimmed.strip_prefix(fence) {
            if let Some(end) = rest.find("```") {
                return rest[..end].trim();
            }
            return rest.trim();
        }
    }
    trimmed
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn repair(text: &str) -> String {
    // Trailing commas before closing braces/brackets.
    let repaired = Regex::new(r",\s*([}\]])")
        .expect("static pattern")
        .replace_all(text, "$1")
        .into_owned();

    // "value" or null / null or "value" fragments.
    let repaired = Regex::new(r#""[^"]*"\s+or\s+null"#)
        .expect("static pattern")
        .replace_all(&repaired, "null")
        .into_owned();
    let repaired = Regex::new(r#"null\s+or\s+"[^"]*""#)
        .expect("static pattern")
        .replace_all(&repaired, "null")
        .into_owned();

    // Unquoted variant: `: value or null`.
    Regex::new(r":\s*\w+\s+or\s+null")
        .expect("static pattern")
        .replace_all(&repaired, ": null")
        .into_owned()
}

fn strip_line_comments(text: &str) -> String {
    text.lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract and parse the JSON object from an LLM reply.
///
/// Fenced code blocks are unwrapped, the outermost `{...}` span is
/// taken, and common formatting faults are repaired. When the first
/// parse fails, one retry strips `//` line comments.
pub fn parse_event_json(response: &str) -> Option<RawEvent> {
    let body = strip_fences(response);
    let body = outermost_object(body)?;
    let repaired = repair(body);

    match serde_json::from_str::<RawEvent>(&repaired) {
        Ok(raw) => Some(raw),
        Err(first_err) => {
            debug!(error = %first_err, "JSON parse failed, retrying without comments");
            let without_comments = strip_line_comments(&repaired);
            match serde_json::from_str::<RawEvent>(&without_comments) {
                Ok(raw) => Some(raw),
                Err(second_err) => {
                    warn!(error = %second_err, "could not parse LLM response as JSON");
                    None
                }
            }
        }
    }
}
