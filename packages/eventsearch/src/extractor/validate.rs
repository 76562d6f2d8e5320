//! Post-validation and normalisation of parsed LLM output.
//!
//! Everything here is defensive against a model that colours outside the
//! enum lines: free-form type labels are mapped onto the closed enums,
//! violent classifications must be corroborated by the article text, and
//! loose value shapes (lists for cities, strings for counts) are coerced.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::types::{Casualties, EventType, Location, PerpetratorType};

/// Words ignored when fuzzy-matching type labels.
const TYPE_STOP_WORDS: [&str; 6] = ["event", "type", "other", "a", "an", "the"];

/// Keywords that must appear in the title or body head for a violent
/// classification to stand. English-only; a localised list would be
/// needed for non-English corpora.
pub const VIOLENCE_KEYWORDS: [&str; 12] = [
    "bomb", "explosion", "attack", "shoot", "terror", "killed", "dead", "casualt", "injur",
    "blast", "kidnap", "abduct",
];

fn spaced(value: &str) -> String {
    value.to_lowercase().replace(['_', '-'], " ")
}

/// Map a free-form event-type label onto the closed enum.
///
/// Order: exact match, keyword heuristics, containment with
/// longest-match preference, reverse containment, word overlap with
/// stop-word exclusion, else `other`.
pub fn normalize_event_type(raw: &str) -> EventType {
    let lower = raw.to_lowercase();

    for event_type in EventType::ALL {
        if event_type.as_str() == lower {
            return event_type;
        }
    }

    let label = spaced(raw);

    if label.contains("visit") || label.contains("diplomatic") {
        return EventType::Meeting;
    }
    if label.contains("summit") || label.contains("bilateral") {
        return EventType::Summit;
    }
    if label.contains("conference") {
        return EventType::Conference;
    }

    // Enum value contained in the label, longest value wins.
    let mut best: Option<(EventType, usize)> = None;
    for event_type in EventType::ALL {
        let value = spaced(event_type.as_str());
        if label.contains(&value) && best.map(|(_, len)| value.len() > len).unwrap_or(true) {
            best = Some((event_type, value.len()));
        }
    }
    if let Some((event_type, _)) = best {
        return event_type;
    }

    // The reverse: label contained in an enum value.
    for event_type in EventType::ALL {
        if spaced(event_type.as_str()).contains(&label) && !label.is_empty() {
            return event_type;
        }
    }

    // Word overlap, ignoring filler words.
    let label_words: Vec<&str> = label
        .split_whitespace()
        .filter(|w| !TYPE_STOP_WORDS.contains(w))
        .collect();
    if !label_words.is_empty() {
        for event_type in EventType::ALL {
            let value = spaced(event_type.as_str());
            let value_words: Vec<&str> = value
                .split_whitespace()
                .filter(|w| !TYPE_STOP_WORDS.contains(w))
                .collect();
            if label_words.iter().any(|w| value_words.contains(w)) {
                return event_type;
            }
        }
    }

    warn!(label = %raw, "unknown event type, defaulting to other");
    EventType::Other
}

/// Map a free-form perpetrator-type label onto the closed enum.
/// Returns `None` for empty input, `Unknown` when uncategorisable.
pub fn normalize_perpetrator_type(raw: &str) -> Option<PerpetratorType> {
    if raw.trim().is_empty() {
        return None;
    }

    let lower = raw.to_lowercase();
    for perp_type in PerpetratorType::ALL {
        if perp_type.as_str() == lower {
            return Some(perp_type);
        }
    }

    let label = spaced(raw);
    for perp_type in PerpetratorType::ALL {
        let value = spaced(perp_type.as_str());
        if label.contains(&value) || value.contains(&label) {
            return Some(perp_type);
        }
    }

    let matched = if label.contains("terror") || label.contains("militant") {
        PerpetratorType::TerroristGroup
    } else if label.contains("state") || label.contains("government") || label.contains("military")
    {
        PerpetratorType::StateActor
    } else if label.contains("criminal") || label.contains("gang") || label.contains("cartel") {
        PerpetratorType::CriminalOrganization
    } else if label.contains("person") || label.contains("individual") || label.contains("man") {
        PerpetratorType::Individual
    } else if label.contains("multiple") || label.contains("several") {
        PerpetratorType::MultipleParties
    } else if label.contains("unknown") || label.contains("unidentified") {
        PerpetratorType::Unknown
    } else {
        warn!(label = %raw, "unknown perpetrator type, defaulting to unknown");
        PerpetratorType::Unknown
    };

    Some(matched)
}

/// Whether the article corroborates a violent classification: at least
/// one violence keyword in the title or the first 1000 chars of the body.
pub fn violence_corroborated(title: &str, content: &str) -> bool {
    let title = title.to_lowercase();
    let head: String = content.chars().take(1000).collect::<String>().to_lowercase();
    VIOLENCE_KEYWORDS
        .iter()
        .any(|keyword| title.contains(keyword) || head.contains(keyword))
}

/// Readable-character ratio over the first 1000 chars: letters, digits,
/// whitespace, and common punctuation.
pub fn readable_ratio(content: &str) -> f64 {
    let sample: Vec<char> = content.chars().take(1000).collect();
    if sample.is_empty() {
        return 0.0;
    }
    let readable = sample
        .iter()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,!?;:()-\"'".contains(**c))
        .count();
    readable as f64 / sample.len() as f64
}

/// Drop characters that are neither printable nor whitespace.
pub fn aggressive_clean(content: &str) -> String {
    content
        .chars()
        .filter(|c| c.is_whitespace() || (!c.is_control() && *c != '\u{FFFD}'))
        .collect()
}

/// A JSON value that should be a string but may be a list: lists are
/// `/`-joined (cross-border events report multiple countries or cities).
pub fn string_or_joined(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            (!parts.is_empty()).then(|| parts.join("/"))
        }
        _ => None,
    }
}

/// Parse the location object, tolerating `state` for `region` and list
/// values for city/country.
pub fn parse_location(value: Option<&serde_json::Value>) -> Location {
    let Some(serde_json::Value::Object(map)) = value else {
        return Location::default();
    };

    let region = map
        .get("region")
        .and_then(string_or_joined)
        .or_else(|| map.get("state").and_then(string_or_joined));

    Location {
        city: map.get("city").and_then(string_or_joined),
        region,
        country: map.get("country").and_then(string_or_joined),
    }
}

/// Parse an event date: `YYYY-MM-DD` first, ISO date-times second.
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime.date());
    }
    warn!(raw = %raw, "could not parse event date");
    None
}

fn coerce_count(value: Option<&serde_json::Value>) -> u32 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0) as u32,
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Parse the casualties object, coercing string counts. Returns `None`
/// when both counts are zero: "no casualties" is absence, not `0/0`.
pub fn parse_casualties(value: Option<&serde_json::Value>) -> Option<Casualties> {
    let Some(serde_json::Value::Object(map)) = value else {
        return None;
    };
    let killed = coerce_count(map.get("killed"));
    let injured = coerce_count(map.get("injured"));
    (killed > 0 || injured > 0).then_some(Casualties { killed, injured })
}

/// Well-known hosts mapped to display names.
const KNOWN_SOURCES: [(&str, &str); 12] = [
    ("bbc", "BBC News"),
    ("reuters", "Reuters"),
    ("cnn", "CNN"),
    ("aljazeera", "Al Jazeera"),
    ("wikipedia", "Wikipedia"),
    ("cbsnews", "CBS News"),
    ("npr", "NPR"),
    ("nypost", "New York Post"),
    ("apnews", "Associated Press"),
    ("alarabiya", "Al Arabiya"),
    ("indiatvnews", "India TV News"),
    ("thenationalnews", "The National News"),
];

/// Derive a human-readable source name from an article URL: well-known
/// domains by lookup, everything else by title-casing the first label of
/// the registered domain.
pub fn source_name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();

    for (needle, name) in KNOWN_SOURCES {
        if host.contains(needle) {
            return Some(name.to_string());
        }
    }

    let label = host.trim_start_matches("www.").split('.').next()?;
    if label.is_empty() {
        return None;
    }
    let mut chars = label.chars();
    let first = chars.next()?;
    debug!(host = %host, "deriving source name from domain");
    Some(first.to_uppercase().chain(chars).collect())
}
