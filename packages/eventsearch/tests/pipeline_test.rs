//! End-to-end pipeline tests over mock collaborators.

use std::sync::Arc;

use futures::StreamExt;

use eventsearch::testing::{test_source, MockLanguageModel, MockScraper};
use eventsearch::{
    EventExtractor, EventType, PipelineSettings, QueryMatcher, SearchOutcome, SearchQuery,
    SearchService, SessionStatus, SessionStore, StreamFrame,
};
use eventsearch::types::Article;
use scraping::{LimitOverrides, SourceConfig, SourceRegistry};

const MEETING_REPLY: &str = r#"{
    "event_type": "meeting",
    "summary": "Two delegations held talks on trade and security cooperation in the capital.",
    "perpetrator": null,
    "perpetrator_type": null,
    "location": {"city": "New Delhi", "region": null, "country": "India"},
    "event_date": "2024-03-10",
    "individuals": ["Alice Example"],
    "organizations": [],
    "casualties": null,
    "confidence": 0.9
}"#;

const ARTICLE_BODY: &str = "Officials from both delegations met in the capital on Monday to \
    discuss trade and security cooperation. The talks covered tariffs, energy, and border \
    arrangements, and both sides described the meeting as productive and constructive.";

fn registry_with(sources: Vec<SourceConfig>) -> Arc<SourceRegistry> {
    Arc::new(SourceRegistry::from_sources(sources))
}

fn article(url: &str) -> Article {
    Article::new(url, ARTICLE_BODY, "Feed").with_title("Delegations hold talks")
}

fn scraper_with_articles(count: usize) -> MockScraper {
    let urls: Vec<String> = (0..count)
        .map(|i| format!("https://feed.example.com/article/{}", i))
        .collect();
    let mut scraper = MockScraper::new().with_urls(
        "Feed",
        urls.iter().map(String::as_str).collect(),
    );
    for url in &urls {
        scraper = scraper.with_article(url, article(url));
    }
    scraper
}

fn service(
    registry: Arc<SourceRegistry>,
    scraper: MockScraper,
    llm: Arc<MockLanguageModel>,
    sessions: Arc<SessionStore>,
) -> SearchService {
    SearchService::new(
        registry,
        Arc::new(scraper),
        Arc::new(EventExtractor::new(llm)),
        QueryMatcher::default(),
        sessions,
        PipelineSettings::default(),
    )
}

fn overrides(search: usize, articles: usize) -> LimitOverrides {
    LimitOverrides {
        max_search_results: Some(search),
        max_articles_to_process: Some(articles),
    }
}

#[tokio::test]
async fn batch_with_no_sources() {
    let service = service(
        registry_with(vec![]),
        MockScraper::new(),
        Arc::new(MockLanguageModel::with_reply(MEETING_REPLY)),
        Arc::new(SessionStore::new()),
    );

    let response = service
        .search(SearchQuery::new("talks"), LimitOverrides::default(), None, None)
        .await;

    assert_eq!(response.status, SearchOutcome::NoSources);
    assert!(response.events.is_empty());
    assert!(response.session_id.is_empty());
}

#[tokio::test]
async fn batch_with_no_articles() {
    // A source exists but discovery yields nothing.
    let service = service(
        registry_with(vec![test_source("Feed")]),
        MockScraper::new(),
        Arc::new(MockLanguageModel::with_reply(MEETING_REPLY)),
        Arc::new(SessionStore::new()),
    );

    let response = service
        .search(SearchQuery::new("talks"), LimitOverrides::default(), None, None)
        .await;

    assert_eq!(response.status, SearchOutcome::NoArticles);
    assert_eq!(response.sources_scraped, 1);
    assert!(response.events.is_empty());
}

#[tokio::test]
async fn batch_with_failing_llm() {
    let service = service(
        registry_with(vec![test_source("Feed")]),
        scraper_with_articles(3),
        Arc::new(MockLanguageModel::failing()),
        Arc::new(SessionStore::new()),
    );

    let response = service
        .search(SearchQuery::new("talks"), overrides(3, 3), None, None)
        .await;

    assert_eq!(response.status, SearchOutcome::NoEvents);
    assert_eq!(response.articles_scraped, 3);
}

#[tokio::test]
async fn batch_success_fills_session() {
    let sessions = Arc::new(SessionStore::new());
    let service = service(
        registry_with(vec![test_source("Feed")]),
        scraper_with_articles(3),
        Arc::new(MockLanguageModel::with_reply(MEETING_REPLY)),
        sessions.clone(),
    );

    let query = SearchQuery::new("trade talks meeting");
    let response = service.search(query, overrides(3, 3), None, None).await;

    assert_eq!(response.status, SearchOutcome::Success);
    assert_eq!(response.total_events, 3);
    assert!(!response.session_id.is_empty());

    for event in &response.events {
        assert_eq!(event.event_type, EventType::Meeting);
        assert!(event.confidence >= 0.3);
    }

    let session = sessions.get_session(&response.session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results.len(), 3);
}

#[tokio::test]
async fn stream_emits_events_then_complete() {
    let sessions = Arc::new(SessionStore::new());
    let service = service(
        registry_with(vec![test_source("Feed")]),
        scraper_with_articles(4),
        Arc::new(MockLanguageModel::with_reply(MEETING_REPLY)),
        sessions.clone(),
    );

    let query = SearchQuery::new("trade talks");
    let session_id = sessions.create(query.clone());
    let frames: Vec<StreamFrame> = service
        .search_stream(query, session_id.clone(), overrides(4, 4), None, None)
        .collect()
        .await;

    let events: Vec<_> = frames
        .iter()
        .filter(|f| matches!(f, StreamFrame::Event { .. }))
        .collect();
    assert_eq!(events.len(), 4);

    // Event indices count up in emission order.
    for (i, frame) in events.iter().enumerate() {
        if let StreamFrame::Event { index, total_articles, .. } = frame {
            assert_eq!(*index, i + 1);
            assert_eq!(*total_articles, 4);
        }
    }

    match frames.last().unwrap() {
        StreamFrame::Complete {
            total_events,
            articles_processed,
            ..
        } => {
            assert_eq!(*total_events, 4);
            assert_eq!(*articles_processed, 4);
        }
        other => panic!("expected Complete, got {:?}", other),
    }

    let session = sessions.get_session(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results.len(), 4);
}

#[tokio::test]
async fn stream_cancelled_before_discovery() {
    let sessions = Arc::new(SessionStore::new());
    let service = service(
        registry_with(vec![test_source("Feed")]),
        scraper_with_articles(4),
        Arc::new(MockLanguageModel::with_reply(MEETING_REPLY)),
        sessions.clone(),
    );

    let query = SearchQuery::new("trade talks");
    let session_id = sessions.create(query.clone());
    sessions.cancel(&session_id);

    let frames: Vec<StreamFrame> = service
        .search_stream(query, session_id.clone(), overrides(4, 4), None, None)
        .collect()
        .await;

    assert!(matches!(
        frames.last().unwrap(),
        StreamFrame::Cancelled { total_events: 0, .. }
    ));
    assert!(!frames.iter().any(|f| matches!(f, StreamFrame::Event { .. })));
    assert!(sessions.get_results(&session_id).unwrap().is_empty());
}

#[tokio::test]
async fn stream_cancelled_mid_run_keeps_earlier_events() {
    let sessions = Arc::new(SessionStore::new());
    let service = service(
        registry_with(vec![test_source("Feed")]),
        scraper_with_articles(10),
        Arc::new(MockLanguageModel::with_reply(MEETING_REPLY)),
        sessions.clone(),
    );

    let query = SearchQuery::new("trade talks");
    let session_id = sessions.create(query.clone());

    let mut stream = Box::pin(service.search_stream(
        query,
        session_id.clone(),
        overrides(10, 10),
        None,
        None,
    ));

    let mut events_seen = 0usize;
    let mut saw_cancelled = false;
    let mut events_after_cancel = 0usize;
    let mut cancelled = false;

    while let Some(frame) = stream.next().await {
        match frame {
            StreamFrame::Event { .. } => {
                if cancelled {
                    events_after_cancel += 1;
                }
                events_seen += 1;
                // Cancel right after the third event is emitted.
                if events_seen == 3 && !cancelled {
                    sessions.cancel(&session_id);
                    cancelled = true;
                }
            }
            StreamFrame::Cancelled { total_events, .. } => {
                saw_cancelled = true;
                assert_eq!(total_events, 3);
            }
            _ => {}
        }
    }

    assert!(saw_cancelled, "expected a cancelled terminal frame");
    assert_eq!(events_after_cancel, 0, "no events may follow cancellation");
    assert_eq!(events_seen, 3);

    // Already-extracted events stay in the session.
    let results = sessions.get_results(&session_id).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(
        sessions.get_session(&session_id).unwrap().status,
        SessionStatus::Cancelled
    );
}

#[tokio::test]
async fn stream_with_no_sources_errors() {
    let sessions = Arc::new(SessionStore::new());
    let service = service(
        registry_with(vec![]),
        MockScraper::new(),
        Arc::new(MockLanguageModel::with_reply(MEETING_REPLY)),
        sessions.clone(),
    );

    let query = SearchQuery::new("anything");
    let session_id = sessions.create(query.clone());
    let frames: Vec<StreamFrame> = service
        .search_stream(query, session_id.clone(), LimitOverrides::default(), None, None)
        .collect()
        .await;

    assert!(matches!(frames.last().unwrap(), StreamFrame::Error { .. }));
    assert_eq!(
        sessions.get_session(&session_id).unwrap().status,
        SessionStatus::Error
    );
}

#[tokio::test]
async fn duplicate_urls_across_sources_are_skipped() {
    let sessions = Arc::new(SessionStore::new());

    // Two sources discovering the same URL; it must be processed once.
    let shared = "https://feed.example.com/article/shared";
    let scraper = MockScraper::new()
        .with_urls("Feed", vec![shared])
        .with_urls("Mirror", vec![shared])
        .with_article(shared, article(shared));

    let service = service(
        registry_with(vec![test_source("Feed"), test_source("Mirror")]),
        scraper,
        Arc::new(MockLanguageModel::with_reply(MEETING_REPLY)),
        sessions,
    );

    let response = service
        .search(SearchQuery::new("trade talks"), overrides(5, 5), None, None)
        .await;

    assert_eq!(response.articles_scraped, 1);
    assert_eq!(response.total_events, 1);
}
