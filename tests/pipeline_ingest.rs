// tests/pipeline_ingest.rs
//
// Pipeline-level integration: dedup gate ordering, deferred cache commit on
// classification failure, and concurrent pushes against one shared pipeline.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crypto_news_analyzer::classifier::{ClassifyError, MockClassifier, NewsClassifier};
use crypto_news_analyzer::{AppConfig, IngestError, NewsPipeline};

fn pipeline() -> (Arc<NewsPipeline>, Arc<MockClassifier>) {
    let mock = Arc::new(MockClassifier::new());
    let classifier: Arc<dyn NewsClassifier> = mock.clone();
    let pipeline = Arc::new(NewsPipeline::new(&AppConfig::default(), classifier));
    (pipeline, mock)
}

#[tokio::test]
async fn failed_classification_leaves_text_retryable() {
    let (p, mock) = pipeline();
    let now = Utc::now();
    let text = "Major exchange halts withdrawals pending investigation";

    mock.enqueue(Err(ClassifyError::Transport("scripted outage".into())));
    let err = p.push(text, None, now).await.unwrap_err();
    assert!(matches!(err, IngestError::Classification(_)));

    // Nothing was committed: the same text must not be treated as duplicate.
    mock.enqueue_score(0.1);
    let id = p.push(text, None, now).await.expect("retry must succeed");
    assert!(id >= 1);
    assert!(p.news_detail(id, now).is_some());
}

#[tokio::test]
async fn accepted_text_rejects_later_duplicates() {
    let (p, _) = pipeline();
    let now = Utc::now();
    let text = "Grayscale converts its trust into a spot ETF";

    p.push(text, None, now).await.expect("first push");

    let err = p.push(text, None, now).await.unwrap_err();
    match err {
        IngestError::Duplicate { similarity } => assert!(similarity >= 0.80),
        other => panic!("expected Duplicate, got {other:?}"),
    }
    // a rejected duplicate leaves the window unchanged
    assert_eq!(p.news_feed(now).len(), 1);
}

#[tokio::test]
async fn duplicate_is_caught_even_after_original_expired() {
    let (p, _) = pipeline();
    let t0 = Utc::now();
    let text = "Regulator signs off on a euro stablecoin framework";

    p.push(text, None, t0).await.expect("push");

    // Past retention (1h): item leaves the window, sweep reclaims it.
    let later = t0 + Duration::minutes(90);
    let stats = p.sweep(later);
    assert_eq!(stats.removed, 1);
    assert!(p.news_feed(later).is_empty());

    // Still inside the 2h dedup lookback: the repeat is rejected.
    let err = p.push(text, None, later).await.unwrap_err();
    assert!(matches!(err, IngestError::Duplicate { .. }));
}

#[tokio::test]
async fn dissimilar_items_are_all_accepted() {
    let (p, _) = pipeline();
    let now = Utc::now();

    let texts = [
        "Bitcoin hashrate sets another record as miners expand capacity",
        "Solana DEX volumes overtake Ethereum for the first time",
        "Tether publishes its quarterly attestation report",
    ];
    for text in texts {
        p.push(text, None, now).await.expect("push");
    }
    assert_eq!(p.news_feed(now).len(), texts.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pushes_get_unique_ids() {
    let (p, _) = pipeline();
    let now = Utc::now();

    let texts = [
        "Bitcoin spot ETF approval ignites a broad market rally",
        "Ethereum gas fees collapse after the latest protocol upgrade",
        "Ripple wins a partial judgment in its securities case",
        "DeFi lending protocol suffers a nine-figure exploit",
    ];

    let mut handles = Vec::new();
    for text in texts {
        let p = p.clone();
        handles.push(tokio::spawn(async move { p.push(text, None, now).await }));
    }

    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.expect("join").expect("push"));
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), texts.len(), "every push must get a distinct id");
    assert_eq!(p.news_feed(now).len(), texts.len());
}
