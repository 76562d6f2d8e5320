//! Data model for the event search pipeline.
//!
//! - [`event`] - Event records and their closed enums
//! - [`article`] - Scraped articles
//! - [`entities`] - Entity bundles from NER
//! - [`query`] - Search queries and the batch response
//! - [`social`] - Social content records
//! - [`frame`] - Streaming output frames

pub mod article;
pub mod entities;
pub mod event;
pub mod frame;
pub mod query;
pub mod social;

pub use article::Article;
pub use entities::EntityBundle;
pub use event::{Casualties, EventRecord, EventType, Location, PerpetratorType};
pub use frame::StreamFrame;
pub use query::{SearchOutcome, SearchQuery, SearchResponse};
pub use social::{
    Engagement, MediaItem, MediaType, Platform, SocialAuthor, SocialContent,
};
