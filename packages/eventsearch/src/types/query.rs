//! Search queries and the batch response envelope.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::event::{EventRecord, EventType};

fn default_max_results() -> usize {
    50
}

/// A natural-language event query with optional filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search phrase or keywords
    pub phrase: String,

    /// Location filter (city, country, or region text)
    #[serde(default)]
    pub location: Option<String>,

    /// Restrict to one event type
    #[serde(default)]
    pub event_type: Option<EventType>,

    /// Start of the date window (inclusive)
    #[serde(default)]
    pub date_from: Option<NaiveDate>,

    /// End of the date window (inclusive)
    #[serde(default)]
    pub date_to: Option<NaiveDate>,

    /// Cap on returned results
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl SearchQuery {
    /// Create a query with just a phrase.
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            location: None,
            event_type: None,
            date_from: None,
            date_to: None,
            max_results: default_max_results(),
        }
    }

    /// Add a location filter.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Add an event-type filter.
    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Add a date window.
    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }
}

/// How a batch search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    Success,
    NoSources,
    NoArticles,
    NoEvents,
    Error,
    Cancelled,
}

/// The materialised result of a batch search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub session_id: String,
    pub events: Vec<EventRecord>,
    pub query: SearchQuery,
    pub total_events: usize,
    pub processing_time_seconds: f64,
    pub articles_scraped: usize,
    pub sources_scraped: usize,
    pub status: SearchOutcome,
    pub message: String,
}
