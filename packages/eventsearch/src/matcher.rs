//! Relevance scoring: filtering and ranking events against a query.
//!
//! The score is a weighted sum of four sub-scores (text, location, date,
//! event type), multiplied by the event's extraction confidence so
//! low-certainty extractions are discounted. Scores therefore never
//! exceed the event's confidence.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{EventRecord, EventType, Location, SearchQuery};

/// English stop words dropped before token comparison.
const STOP_WORDS: [&str; 41] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "should", "could", "may", "might", "can", "this", "that", "these",
    "those", "it", "its",
];

/// Weights for the four relevance dimensions. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatchWeights {
    pub text: f64,
    pub location: f64,
    pub date: f64,
    pub event_type: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            text: 0.40,
            location: 0.25,
            date: 0.20,
            event_type: 0.15,
        }
    }
}

impl MatchWeights {
    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.text + self.location + self.date + self.event_type
    }
}

/// An event paired with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredEvent {
    pub event: EventRecord,
    pub relevance_score: f64,
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn keywords(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .filter(|word| word.len() > 2 && !STOP_WORDS.contains(word))
        .map(|word| word.to_string())
        .collect()
}

/// Longest-common-subsequence similarity in [0, 1], comparable to a
/// difflib-style ratio: 2·LCS / (len_a + len_b) over characters.
///
/// Inputs are capped at 500 chars to bound the quadratic table.
fn sequence_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().take(500).collect();
    let b: Vec<char> = b.chars().take(500).collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut prev, &mut current);
    }

    let lcs = prev[b.len()];
    2.0 * lcs as f64 / (a.len() + b.len()) as f64
}

/// Matches and ranks events against search queries.
pub struct QueryMatcher {
    weights: MatchWeights,
}

impl Default for QueryMatcher {
    fn default() -> Self {
        Self::new(MatchWeights::default())
    }
}

impl QueryMatcher {
    /// Create a matcher with the given weights.
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    /// Text similarity between the query phrase and the event's title
    /// plus summary: Jaccard over stop-worded keyword sets (weight 0.7)
    /// blended with full-string sequence similarity (weight 0.3).
    pub fn text_score(&self, phrase: &str, event: &EventRecord) -> f64 {
        if phrase.is_empty() {
            return 0.0;
        }

        let event_text = format!("{} {}", event.title, event.summary);
        let query_keywords = keywords(phrase);
        if query_keywords.is_empty() {
            return 0.0;
        }
        let event_keywords = keywords(&event_text);

        let intersection = query_keywords.intersection(&event_keywords).count();
        let union = query_keywords.union(&event_keywords).count();
        let jaccard = if union > 0 {
            intersection as f64 / union as f64
        } else {
            0.0
        };

        let sequence = sequence_similarity(&normalize(phrase), &normalize(&event_text));

        (jaccard * 0.7 + sequence * 0.3).min(1.0)
    }

    /// Location similarity: the best match among the event's city,
    /// country, and region against the query's location text. Containment
    /// either way scores 1.0; otherwise sequence similarity.
    pub fn location_score(&self, query_location: Option<&str>, location: &Location) -> f64 {
        let Some(query_location) = query_location else {
            return 0.0;
        };
        if location.is_empty() {
            return 0.0;
        }

        let query_norm = normalize(query_location);
        let mut best: f64 = 0.0;

        for component in [&location.city, &location.country, &location.region]
            .into_iter()
            .flatten()
        {
            let component = normalize(component);
            let score = if component.contains(&query_norm) || query_norm.contains(&component) {
                1.0
            } else {
                sequence_similarity(&query_norm, &component)
            };
            best = best.max(score);
        }

        best
    }

    /// Date relevance: 1.0 inside the window, linear falloff over 30
    /// days outside it, 0.5 when no range was given, 0.3 when the event
    /// is undated but a range was.
    pub fn date_score(&self, query: &SearchQuery, event_date: Option<NaiveDate>) -> f64 {
        if query.date_from.is_none() && query.date_to.is_none() {
            return 0.5;
        }
        let Some(event_date) = event_date else {
            return 0.3;
        };

        if let Some(from) = query.date_from {
            if event_date < from {
                let days = (from - event_date).num_days();
                return (1.0 - days as f64 / 30.0).max(0.0);
            }
        }
        if let Some(to) = query.date_to {
            if event_date > to {
                let days = (event_date - to).num_days();
                return (1.0 - days as f64 / 30.0).max(0.0);
            }
        }

        1.0
    }

    /// Event-type match: exact 1.0, mismatch 0.0, 0.5 when the query
    /// does not specify a type.
    pub fn type_score(&self, query_type: Option<EventType>, event_type: EventType) -> f64 {
        match query_type {
            None => 0.5,
            Some(requested) if requested == event_type => 1.0,
            Some(_) => 0.0,
        }
    }

    /// Overall relevance in [0, 1]: the weighted sum multiplied by the
    /// event's confidence.
    pub fn relevance_score(&self, query: &SearchQuery, event: &EventRecord) -> f64 {
        let text = self.text_score(&query.phrase, event);
        let location = self.location_score(query.location.as_deref(), &event.location);
        let date = self.date_score(query, event.event_date);
        let event_type = self.type_score(query.event_type, event.event_type);

        let weighted = text * self.weights.text
            + location * self.weights.location
            + date * self.weights.date
            + event_type * self.weights.event_type;

        let score = weighted * event.confidence;

        debug!(
            title = %event.title.chars().take(30).collect::<String>(),
            text, location, date, event_type, weighted, score,
            "relevance scores"
        );

        score
    }

    /// Score all events, keep those at or above `min_score`, and sort by
    /// score descending.
    pub fn match_events(
        &self,
        events: Vec<EventRecord>,
        query: &SearchQuery,
        min_score: f64,
    ) -> Vec<ScoredEvent> {
        let total = events.len();
        let mut scored: Vec<ScoredEvent> = events
            .into_iter()
            .filter_map(|event| {
                let relevance_score = self.relevance_score(query, &event);
                (relevance_score >= min_score).then_some(ScoredEvent {
                    event,
                    relevance_score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(matched = scored.len(), total, min_score, "matched events");
        scored
    }

    /// Keep only events whose date falls inside the inclusive range.
    pub fn filter_by_date_range(
        &self,
        events: Vec<EventRecord>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Vec<EventRecord> {
        if date_from.is_none() && date_to.is_none() {
            return events;
        }
        events
            .into_iter()
            .filter(|event| {
                let Some(date) = event.event_date else {
                    return false;
                };
                if let Some(from) = date_from {
                    if date < from {
                        return false;
                    }
                }
                if let Some(to) = date_to {
                    if date > to {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// Keep only events of one type.
    pub fn filter_by_event_type(
        &self,
        events: Vec<EventRecord>,
        event_type: EventType,
    ) -> Vec<EventRecord> {
        events
            .into_iter()
            .filter(|event| event.event_type == event_type)
            .collect()
    }

    /// Keep only events whose location mentions the keyword.
    pub fn filter_by_location(&self, events: Vec<EventRecord>, location: &str) -> Vec<EventRecord> {
        let needle = location.to_lowercase();
        events
            .into_iter()
            .filter(|event| {
                [
                    &event.location.city,
                    &event.location.country,
                    &event.location.region,
                ]
                .into_iter()
                .flatten()
                .any(|component| component.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, summary: &str, confidence: f64) -> EventRecord {
        EventRecord {
            event_type: EventType::Bombing,
            event_sub_type: None,
            title: title.to_string(),
            summary: summary.to_string(),
            perpetrator: None,
            perpetrator_type: None,
            location: Location {
                city: Some("Kabul".to_string()),
                region: None,
                country: Some("Afghanistan".to_string()),
            },
            event_date: NaiveDate::from_ymd_opt(2023, 1, 15),
            event_time: None,
            participants: vec![],
            organizations: vec![],
            casualties: None,
            source_name: None,
            source_url: None,
            article_published_date: None,
            collection_timestamp: None,
            confidence,
            full_content: None,
        }
    }

    #[test]
    fn test_score_bounded_by_confidence() {
        let matcher = QueryMatcher::default();
        let event = event(
            "Bombing at Kabul checkpoint",
            "A suicide bomber attacked a checkpoint in Kabul killing soldiers.",
            0.6,
        );
        let query = SearchQuery::new("bombing in kabul")
            .with_location("Kabul")
            .with_event_type(EventType::Bombing);

        let score = matcher.relevance_score(&query, &event);
        assert!(score > 0.0);
        assert!(score <= event.confidence);
        assert!(score <= 1.0);
    }

    #[test]
    fn test_text_score_rewards_overlap() {
        let matcher = QueryMatcher::default();
        let relevant = event(
            "Bombing at Kabul checkpoint",
            "A suicide bombing hit a checkpoint.",
            1.0,
        );
        let irrelevant = event(
            "Stock markets rally",
            "Equities climbed on strong earnings.",
            1.0,
        );

        let relevant_score = matcher.text_score("bombing kabul checkpoint", &relevant);
        let irrelevant_score = matcher.text_score("bombing kabul checkpoint", &irrelevant);
        assert!(relevant_score > irrelevant_score);
    }

    #[test]
    fn test_location_score_containment() {
        let matcher = QueryMatcher::default();
        let location = Location {
            city: Some("Kabul".to_string()),
            region: None,
            country: Some("Afghanistan".to_string()),
        };
        assert_eq!(matcher.location_score(Some("kabul"), &location), 1.0);
        assert_eq!(
            matcher.location_score(Some("kabul afghanistan"), &location),
            1.0
        );
        assert_eq!(matcher.location_score(None, &location), 0.0);
    }

    #[test]
    fn test_date_score_window_and_falloff() {
        let matcher = QueryMatcher::default();
        let query = SearchQuery::new("x").with_date_range(
            NaiveDate::from_ymd_opt(2023, 1, 1),
            NaiveDate::from_ymd_opt(2023, 1, 31),
        );

        // Inside the window.
        assert_eq!(
            matcher.date_score(&query, NaiveDate::from_ymd_opt(2023, 1, 15)),
            1.0
        );
        // 15 days after the window: 1 - 15/30.
        let after = matcher.date_score(&query, NaiveDate::from_ymd_opt(2023, 2, 15));
        assert!((after - 0.5).abs() < 1e-9);
        // Far outside.
        assert_eq!(
            matcher.date_score(&query, NaiveDate::from_ymd_opt(2024, 1, 1)),
            0.0
        );
        // No date on the event.
        assert_eq!(matcher.date_score(&query, None), 0.3);
        // No range on the query.
        let open = SearchQuery::new("x");
        assert_eq!(
            matcher.date_score(&open, NaiveDate::from_ymd_opt(2023, 1, 15)),
            0.5
        );
    }

    #[test]
    fn test_type_score() {
        let matcher = QueryMatcher::default();
        assert_eq!(
            matcher.type_score(Some(EventType::Bombing), EventType::Bombing),
            1.0
        );
        assert_eq!(
            matcher.type_score(Some(EventType::Meeting), EventType::Bombing),
            0.0
        );
        assert_eq!(matcher.type_score(None, EventType::Bombing), 0.5);
    }

    #[test]
    fn test_match_events_filters_and_sorts() {
        let matcher = QueryMatcher::default();
        let strong = event(
            "Bombing at Kabul checkpoint",
            "A suicide bombing hit a checkpoint in Kabul.",
            0.9,
        );
        let weak = event("Unrelated festival", "A music festival took place.", 0.4);
        let query = SearchQuery::new("bombing kabul").with_location("Kabul");

        let matched = matcher.match_events(vec![weak, strong], &query, 0.1);
        assert!(!matched.is_empty());
        assert_eq!(matched[0].event.title, "Bombing at Kabul checkpoint");
        for window in matched.windows(2) {
            assert!(window[0].relevance_score >= window[1].relevance_score);
        }
    }

    #[test]
    fn test_filter_helpers() {
        let matcher = QueryMatcher::default();
        let e = event("Bombing", "summary", 0.9);

        let by_type = matcher.filter_by_event_type(vec![e.clone()], EventType::Meeting);
        assert!(by_type.is_empty());

        let by_location = matcher.filter_by_location(vec![e.clone()], "afghan");
        assert_eq!(by_location.len(), 1);

        let by_date = matcher.filter_by_date_range(
            vec![e],
            NaiveDate::from_ymd_opt(2024, 1, 1),
            None,
        );
        assert!(by_date.is_empty());
    }

    #[test]
    fn test_sequence_similarity_bounds() {
        assert_eq!(sequence_similarity("", "abc"), 0.0);
        assert!((sequence_similarity("abc", "abc") - 1.0).abs() < 1e-9);
        let partial = sequence_similarity("kabul bombing", "bombing in kabul");
        assert!(partial > 0.0 && partial < 1.0);
    }
}
