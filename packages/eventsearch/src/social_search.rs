//! The social-media path: aggregator content feeding the event extractor.
//!
//! Articles go query -> discovery -> fetch -> extract; social posts skip
//! discovery and fetching entirely. The aggregator produces a common
//! content record, the extractor analyses its text, and the analysis is
//! cached by URL and model so repeated lookups cost nothing.

use std::sync::Arc;

use llm_client::Provider;
use tracing::{debug, info};

use crate::aggregator::ContentAggregator;
use crate::extractor::{EventExtractor, ExtractionInput};
use crate::types::{Platform, SocialContent};

/// Analyses social content into event records, with caching.
pub struct SocialAnalyzer {
    aggregator: Arc<ContentAggregator>,
    extractor: Arc<EventExtractor>,
}

impl SocialAnalyzer {
    /// Create an analyzer over the aggregator and extractor.
    pub fn new(aggregator: Arc<ContentAggregator>, extractor: Arc<EventExtractor>) -> Self {
        Self {
            aggregator,
            extractor,
        }
    }

    /// The aggregator backing this analyzer.
    pub fn aggregator(&self) -> &Arc<ContentAggregator> {
        &self.aggregator
    }

    /// Fetch one social URL and attach an extracted event.
    ///
    /// Content and analysis caches are consulted first; a cache-served
    /// analysis costs no LLM call. A fresh analysis is cached under the
    /// model that produced it.
    pub async fn analyze_url(
        &self,
        url: &str,
        platform: Option<Platform>,
        provider: Option<Provider>,
        model: Option<&str>,
    ) -> Option<SocialContent> {
        let mut content = self
            .aggregator
            .fetch_content(url, platform, false, model)
            .await?;

        if content.extracted_event.is_some() {
            debug!(url = %url, "analysis served from cache");
            return Some(content);
        }

        let text = match (&content.title, &content.description) {
            (Some(title), Some(description)) => {
                format!("{}\n\n{}\n\n{}", title, description, content.text)
            }
            (Some(title), None) => format!("{}\n\n{}", title, content.text),
            _ => content.text.clone(),
        };

        let input = ExtractionInput {
            title: content
                .title
                .clone()
                .unwrap_or_else(|| format!("{} post", content.platform)),
            content: text,
            url: Some(content.url.clone()),
            source_name: Some(content.platform.as_str().to_string()),
            provider,
            model: model.map(String::from),
            ..ExtractionInput::default()
        };

        let extraction = self.extractor.extract_event(&input).await;
        if let Some(event) = extraction.event {
            info!(url = %url, event_type = %event.event_type, "analysed social content");
            self.aggregator.save_analysis(url, event.clone(), model);
            content.extracted_event = Some(event);
        } else {
            debug!(url = %url, reason = ?extraction.meta.skip_reason, "no event in social content");
        }

        Some(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::PlatformAdapter;
    use crate::testing::MockLanguageModel;
    use crate::types::SocialAuthor;
    use async_trait::async_trait;

    struct PostAdapter;

    #[async_trait]
    impl PlatformAdapter for PostAdapter {
        fn platform(&self) -> Platform {
            Platform::Twitter
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn fetch(&self, url: &str) -> Option<SocialContent> {
            Some(SocialContent {
                platform: Platform::Twitter,
                content_type: "tweet".to_string(),
                url: url.to_string(),
                platform_id: "1".to_string(),
                text: "Large crowds are protesting downtown today over the new policy. \
                       Organizers say thousands joined the demonstration near the square."
                    .to_string(),
                title: None,
                description: None,
                author: SocialAuthor::default(),
                posted_at: None,
                media: vec![],
                engagement: Default::default(),
                platform_data: Default::default(),
                extracted_event: None,
                cached: false,
                cache_expires_at: None,
            })
        }
    }

    const PROTEST_REPLY: &str = r#"{
        "event_type": "protest",
        "summary": "Crowds protested downtown over a new policy. Organizers reported thousands of participants.",
        "location": {"city": null, "region": null, "country": null},
        "individuals": [],
        "organizations": [],
        "casualties": null,
        "confidence": 0.8
    }"#;

    fn analyzer(mock: Arc<MockLanguageModel>) -> SocialAnalyzer {
        SocialAnalyzer::new(
            Arc::new(ContentAggregator::new(vec![Box::new(PostAdapter)], 24)),
            Arc::new(EventExtractor::new(mock)),
        )
    }

    #[tokio::test]
    async fn test_analysis_extracts_and_caches() {
        let mock = Arc::new(MockLanguageModel::with_reply(PROTEST_REPLY));
        let analyzer = analyzer(mock.clone());
        let url = "https://twitter.com/org/status/1";

        let content = analyzer.analyze_url(url, None, None, None).await.unwrap();
        let event = content.extracted_event.unwrap();
        assert_eq!(event.event_type, crate::types::EventType::Protest);
        assert_eq!(mock.call_count(), 1);

        // Second lookup: content and analysis both served from cache.
        let again = analyzer.analyze_url(url, None, None, None).await.unwrap();
        assert!(again.cached);
        assert!(again.extracted_event.is_some());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unextractable_content_still_returned() {
        let mock = Arc::new(MockLanguageModel::with_reply("not json"));
        let analyzer = analyzer(mock);
        let url = "https://twitter.com/org/status/2";

        let content = analyzer.analyze_url(url, None, None, None).await.unwrap();
        assert!(content.extracted_event.is_none());
        assert!(!content.text.is_empty());
    }
}
