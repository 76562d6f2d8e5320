//! Event extraction: turning an article into a validated event record.
//!
//! The flow is gate -> prompt -> LLM -> parse -> validate. Every failure
//! mode is non-fatal and non-retried at this layer: the result is an
//! absent event plus a skip reason, and the pipeline moves on.

pub mod json;
pub mod prompt;
pub mod validate;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use llm_client::{GenerationMeta, GenerationRequest, Provider, UsageBreakdown};
use tracing::{debug, info, warn};

use crate::llm::LanguageModel;
use crate::ner;
use crate::types::{Article, EntityBundle, EventRecord, EventType};

use json::{parse_event_json, RawEvent};
use prompt::{build_extraction_prompt, SYSTEM_PROMPT};
use validate::{
    aggressive_clean, normalize_event_type, normalize_perpetrator_type, parse_casualties,
    parse_event_date, parse_location, readable_ratio, source_name_from_url,
    violence_corroborated,
};

/// Reject content below this readable ratio without an LLM call.
const QUALITY_REJECT_RATIO: f64 = 0.30;

/// Below this ratio, clean aggressively before prompting.
const QUALITY_CLEAN_RATIO: f64 = 0.50;

/// Retained events must reach this confidence.
const MIN_CONFIDENCE: f64 = 0.3;

/// Why an article produced no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Content failed the readability gate; no LLM call was made
    LowQualityContent,
    /// The LLM call failed or returned nothing
    LlmFailed,
    /// The reply could not be parsed as JSON even after repair
    ParseFailure,
    /// The model explicitly signalled there is no event
    NoEvent,
    /// Confidence below the retention threshold
    LowConfidence,
}

/// Metadata accompanying every extraction attempt.
#[derive(Debug, Clone, Default)]
pub struct ExtractionMeta {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub usage: Option<UsageBreakdown>,
    pub fallback_used: bool,
    pub skip_reason: Option<SkipReason>,
}

impl ExtractionMeta {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skip_reason: Some(reason),
            ..Self::default()
        }
    }

    fn from_generation(meta: GenerationMeta) -> Self {
        Self {
            provider: Some(meta.provider),
            model: Some(meta.model),
            usage: meta.usage,
            fallback_used: meta.fallback_used,
            skip_reason: None,
        }
    }
}

/// The result of one extraction attempt.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub event: Option<EventRecord>,
    pub meta: ExtractionMeta,
}

/// Inputs for one extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionInput {
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub source_name: Option<String>,
    pub article_published_date: Option<NaiveDate>,
    pub entities: Option<EntityBundle>,
    pub provider: Option<Provider>,
    pub model: Option<String>,
}

impl From<&Article> for ExtractionInput {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title_or_untitled().to_string(),
            content: article.content.clone(),
            url: Some(article.url.clone()),
            source_name: Some(article.source_name.clone()),
            article_published_date: article.published_date.map(|d| d.date_naive()),
            ..Self::default()
        }
    }
}

/// Extracts structured event data from article content via the LLM.
pub struct EventExtractor {
    llm: Arc<dyn LanguageModel>,
}

impl EventExtractor {
    /// Create an extractor over any language model.
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Extract an event from one article's content.
    pub async fn extract_event(&self, input: &ExtractionInput) -> Extraction {
        let title = input.title.as_str();
        info!(title = %title.chars().take(50).collect::<String>(), "extracting event");

        // Quality gate before the expensive call.
        let ratio = readable_ratio(&input.content);
        let content = if ratio < QUALITY_REJECT_RATIO {
            warn!(ratio, "content quality too low for LLM, skipping");
            return Extraction {
                event: None,
                meta: ExtractionMeta::skipped(SkipReason::LowQualityContent),
            };
        } else if ratio < QUALITY_CLEAN_RATIO {
            warn!(ratio, "content quality marginal, cleaning aggressively");
            aggressive_clean(&input.content)
        } else {
            input.content.clone()
        };

        let detected;
        let entities = match &input.entities {
            Some(entities) => Some(entities),
            None => {
                detected = ner::extract_entities(title, &content);
                debug!(count = detected.count(), "detected entities");
                (!detected.is_empty()).then_some(&detected)
            }
        };

        let request = GenerationRequest::new(build_extraction_prompt(title, &content, entities))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_max_tokens(500)
            .with_temperature(0.2);
        let request = match &input.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        };

        let (response, meta) = match self.llm.generate(&request, input.provider).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "LLM call failed");
                return Extraction {
                    event: None,
                    meta: ExtractionMeta::skipped(SkipReason::LlmFailed),
                };
            }
        };
        let mut meta = ExtractionMeta::from_generation(meta);

        if response.trim().is_empty() {
            meta.skip_reason = Some(SkipReason::LlmFailed);
            return Extraction { event: None, meta };
        }

        let Some(raw) = parse_event_json(&response) else {
            meta.skip_reason = Some(SkipReason::ParseFailure);
            return Extraction { event: None, meta };
        };

        if raw.signals_no_event() {
            debug!("model signalled no extractable event");
            meta.skip_reason = Some(SkipReason::NoEvent);
            return Extraction { event: None, meta };
        }

        match self.build_event(input, &content, raw, entities) {
            Some(event) => {
                info!(
                    event_type = %event.event_type,
                    confidence = event.confidence,
                    "extracted event"
                );
                Extraction {
                    event: Some(event),
                    meta,
                }
            }
            None => {
                meta.skip_reason = Some(SkipReason::LowConfidence);
                Extraction { event: None, meta }
            }
        }
    }

    /// Validate and normalise a parsed reply into an event record.
    fn build_event(
        &self,
        input: &ExtractionInput,
        content: &str,
        raw: RawEvent,
        entities: Option<&EntityBundle>,
    ) -> Option<EventRecord> {
        let confidence = raw.confidence.unwrap_or(0.0);
        if confidence < MIN_CONFIDENCE {
            warn!(confidence, "rejecting extraction, confidence too low");
            return None;
        }

        let mut event_type = normalize_event_type(raw.event_type.as_deref().unwrap_or("other"));
        let mut perpetrator = raw.perpetrator.clone();
        let mut perpetrator_type = raw
            .perpetrator_type
            .as_deref()
            .and_then(normalize_perpetrator_type);
        let mut casualties = parse_casualties(raw.casualties.as_ref());

        // Violence consistency: a violent classification must be backed
        // by the article text, else demote and clear the violent fields.
        if event_type.is_violent() && !violence_corroborated(&input.title, content) {
            warn!(
                claimed = %event_type,
                "violent event type not corroborated by article, demoting to other"
            );
            event_type = EventType::Other;
            perpetrator = None;
            perpetrator_type = None;
            casualties = None;
        }

        let event_date = raw
            .event_date
            .as_deref()
            .and_then(parse_event_date)
            .or(input.article_published_date);

        let mut participants = raw.individuals.clone().unwrap_or_default();
        let mut organizations = raw.organizations.clone().unwrap_or_default();
        if let Some(entities) = entities {
            merge_unique(&mut participants, entities.persons.iter().take(10));
            merge_unique(&mut organizations, entities.organizations.iter().take(10));
        }
        dedup_case_insensitive(&mut participants);
        dedup_case_insensitive(&mut organizations);

        let source_name = input
            .source_name
            .clone()
            .or_else(|| input.url.as_deref().and_then(source_name_from_url));

        Some(EventRecord {
            event_type,
            event_sub_type: raw.event_sub_type.clone(),
            title: input.title.clone(),
            summary: raw.summary_text(),
            perpetrator,
            perpetrator_type,
            location: parse_location(raw.location.as_ref()),
            event_date,
            event_time: raw.event_time.clone(),
            participants,
            organizations,
            casualties,
            source_name,
            source_url: input.url.clone(),
            article_published_date: input.article_published_date.or(event_date),
            collection_timestamp: Some(Utc::now()),
            confidence: confidence.clamp(0.0, 1.0),
            full_content: Some(content.to_string()),
        })
    }

    /// Extract from an [`Article`], detecting entities first.
    pub async fn extract_from_article(
        &self,
        article: &Article,
        provider: Option<Provider>,
        model: Option<&str>,
    ) -> Extraction {
        let mut input = ExtractionInput::from(article);
        input.provider = provider;
        input.model = model.map(String::from);
        self.extract_event(&input).await
    }

    /// Extract from a batch of articles sequentially, keeping only
    /// successes.
    pub async fn extract_batch(
        &self,
        articles: &[Article],
        provider: Option<Provider>,
        model: Option<&str>,
    ) -> Vec<(EventRecord, ExtractionMeta)> {
        let mut events = Vec::new();
        for (i, article) in articles.iter().enumerate() {
            debug!(index = i + 1, total = articles.len(), "batch extraction");
            let extraction = self.extract_from_article(article, provider, model).await;
            if let Some(event) = extraction.event {
                events.push((event, extraction.meta));
            }
        }
        info!(
            extracted = events.len(),
            total = articles.len(),
            "batch extraction complete"
        );
        events
    }
}

fn merge_unique<'a>(target: &mut Vec<String>, additions: impl Iterator<Item = &'a String>) {
    for addition in additions {
        if !target
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(addition))
        {
            target.push(addition.clone());
        }
    }
}

fn dedup_case_insensitive(list: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    list.retain(|item| seen.insert(item.to_lowercase()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLanguageModel;

    fn extractor(reply: &str) -> EventExtractor {
        EventExtractor::new(Arc::new(MockLanguageModel::with_reply(reply)))
    }

    fn input(title: &str, content: &str) -> ExtractionInput {
        ExtractionInput {
            title: title.to_string(),
            content: content.to_string(),
            url: Some("https://www.bbc.com/news/world-1".to_string()),
            ..ExtractionInput::default()
        }
    }

    const SUMMIT_REPLY: &str = r#"{
        "event_type": "summit",
        "event_sub_type": "bilateral summit",
        "summary": "Putin visited India for the 23rd Russia-India Summit. Talks with PM Modi focused on economic cooperation. Trade is to reach $100 billion by 2030.",
        "perpetrator": null,
        "perpetrator_type": null,
        "location": {"city": "New Delhi", "region": null, "country": "India"},
        "event_date": "2025-12-05",
        "event_time": null,
        "individuals": ["Vladimir Putin", "Narendra Modi"],
        "organizations": ["Kremlin"],
        "casualties": null,
        "confidence": 0.9
    }"#;

    const SUMMIT_ARTICLE: &str = "Russian President Putin visited India for the 23rd Russia-India \
        Summit. He held talks with PM Modi focusing on economic cooperation. The two leaders \
        agreed to boost bilateral trade to $100 billion by 2030.";

    #[tokio::test]
    async fn test_diplomatic_summit_extraction() {
        let extractor = extractor(SUMMIT_REPLY);
        let extraction = extractor
            .extract_event(&input("Putin visits India", SUMMIT_ARTICLE))
            .await;

        let event = extraction.event.unwrap();
        assert_eq!(event.event_type, EventType::Summit);
        assert_eq!(event.location.country.as_deref(), Some("India"));
        assert!(event.participants.contains(&"Vladimir Putin".to_string()));
        assert!(event.participants.contains(&"Narendra Modi".to_string()));
        assert!(event.casualties.is_none());
        assert!(event.confidence >= 0.8);
        assert_eq!(event.source_name.as_deref(), Some("BBC News"));
    }

    const BOMBING_REPLY: &str = r#"{
        "event_type": "bombing",
        "event_sub_type": "suicide bombing",
        "summary": "A suicide bomber attacked a checkpoint in Kabul. The Islamic State claimed responsibility.",
        "perpetrator": "Islamic State",
        "perpetrator_type": "terrorist_group",
        "location": {"city": "Kabul", "region": null, "country": "Afghanistan"},
        "event_date": "2023-01-01",
        "individuals": [],
        "organizations": ["Islamic State", "Taliban"],
        "casualties": {"killed": 20, "injured": 30},
        "confidence": 0.85
    }"#;

    const BOMBING_ARTICLE: &str = "A suicide bomber attacked a checkpoint in Kabul. The Islamic \
        State claimed responsibility, claiming to have killed 20 people and injured 30.";

    #[tokio::test]
    async fn test_bombing_with_claim() {
        let extractor = extractor(BOMBING_REPLY);
        let extraction = extractor
            .extract_event(&input("Kabul checkpoint attacked", BOMBING_ARTICLE))
            .await;

        let event = extraction.event.unwrap();
        assert_eq!(event.event_type, EventType::Bombing);
        assert_eq!(event.perpetrator.as_deref(), Some("Islamic State"));
        assert_eq!(
            event.perpetrator_type,
            Some(crate::types::PerpetratorType::TerroristGroup)
        );
        let casualties = event.casualties.unwrap();
        assert_eq!(casualties.killed, 20);
        assert_eq!(casualties.injured, 30);
        assert_eq!(event.location.city.as_deref(), Some("Kabul"));
        assert_eq!(event.location.country.as_deref(), Some("Afghanistan"));
    }

    #[tokio::test]
    async fn test_uncorroborated_violence_demoted() {
        // Model claims a bombing, but the article is about a trade deal.
        let extractor = extractor(BOMBING_REPLY);
        let extraction = extractor
            .extract_event(&input(
                "Leaders sign trade agreement",
                "The two countries signed a comprehensive trade agreement covering \
                 tariffs, energy cooperation, and agricultural exports over the next decade.",
            ))
            .await;

        let event = extraction.event.unwrap();
        assert_eq!(event.event_type, EventType::Other);
        assert!(event.perpetrator.is_none());
        assert!(event.perpetrator_type.is_none());
        assert!(event.casualties.is_none());
        // Still retained: confidence was above threshold.
        assert!(event.confidence >= 0.3);
    }

    #[tokio::test]
    async fn test_corrupt_content_skips_llm() {
        let garbage: String = std::iter::repeat('\u{0002}').take(800).collect();
        let mock = Arc::new(MockLanguageModel::with_reply(SUMMIT_REPLY));
        let extractor = EventExtractor::new(mock.clone());

        let extraction = extractor.extract_event(&input("Title", &garbage)).await;

        assert!(extraction.event.is_none());
        assert_eq!(
            extraction.meta.skip_reason,
            Some(SkipReason::LowQualityContent)
        );
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_low_confidence_rejected() {
        let reply = r#"{"event_type": "other", "summary": "Unclear.", "confidence": 0.2}"#;
        let extractor = extractor(reply);
        let extraction = extractor
            .extract_event(&input("Something", SUMMIT_ARTICLE))
            .await;

        assert!(extraction.event.is_none());
        assert_eq!(extraction.meta.skip_reason, Some(SkipReason::LowConfidence));
    }

    #[tokio::test]
    async fn test_unparseable_reply() {
        let extractor = extractor("I could not find an event in this article, sorry!");
        let extraction = extractor
            .extract_event(&input("Title", SUMMIT_ARTICLE))
            .await;

        assert!(extraction.event.is_none());
        assert_eq!(extraction.meta.skip_reason, Some(SkipReason::ParseFailure));
    }

    #[tokio::test]
    async fn test_participant_lists_have_no_duplicates() {
        // Reply lists Putin; NER over the article will also find him.
        let extractor = extractor(SUMMIT_REPLY);
        let extraction = extractor
            .extract_event(&input("Putin visits India", SUMMIT_ARTICLE))
            .await;

        let event = extraction.event.unwrap();
        let unique: std::collections::HashSet<String> =
            event.participants.iter().map(|p| p.to_lowercase()).collect();
        assert_eq!(
            unique.len(),
            event.participants.len(),
            "duplicate participants: {:?}",
            event.participants
        );
    }

    #[tokio::test]
    async fn test_date_falls_back_to_article_date() {
        let reply = r#"{"event_type": "meeting", "summary": "A meeting.", "confidence": 0.7}"#;
        let extractor = extractor(reply);
        let mut i = input("Meeting held", SUMMIT_ARTICLE);
        i.article_published_date = NaiveDate::from_ymd_opt(2024, 6, 1);

        let extraction = extractor.extract_event(&i).await;
        let event = extraction.event.unwrap();
        assert_eq!(event.event_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    }
}
