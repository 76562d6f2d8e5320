//! A fetched, text-extracted news page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One scraped article, transient within a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub published_date: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub source_name: String,
    pub scraped_at: DateTime<Utc>,
}

impl Article {
    /// Create an article with a fresh id and the current scrape time.
    pub fn new(
        url: impl Into<String>,
        content: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            title: None,
            content: content.into(),
            published_date: None,
            author: None,
            source_name: source_name.into(),
            scraped_at: Utc::now(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Title, or "Untitled" for display purposes.
    pub fn title_or_untitled(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }
}
