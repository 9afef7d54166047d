// tests/sweeper_tick.rs
//
// Background sweep task under a paused tokio clock: ticks fire without real
// sleeping, and the handle doubles as the shutdown hook.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crypto_news_analyzer::classifier::{MockClassifier, NewsClassifier};
use crypto_news_analyzer::sweeper::spawn_sweeper;
use crypto_news_analyzer::{AppConfig, NewsPipeline};

fn pipeline() -> (Arc<NewsPipeline>, Arc<MockClassifier>) {
    let mock = Arc::new(MockClassifier::new());
    let classifier: Arc<dyn NewsClassifier> = mock.clone();
    let pipeline = Arc::new(NewsPipeline::new(&AppConfig::default(), classifier));
    (pipeline, mock)
}

#[tokio::test(start_paused = true)]
async fn sweeper_evicts_expired_items() {
    let (p, _) = pipeline();

    // Inserted two hours in the past: already expired, awaiting reclamation.
    let stale = Utc::now() - Duration::hours(2);
    p.push("Old headline from well outside the window", None, stale)
        .await
        .expect("push");
    assert_eq!(p.window_stats(Utc::now()).physical_items, 1);
    assert!(p.news_feed(Utc::now()).is_empty(), "logically expired already");

    let handle = spawn_sweeper(p.clone(), StdDuration::from_secs(60));

    // First interval tick fires immediately; give the task a chance to run.
    tokio::time::advance(StdDuration::from_millis(10)).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }

    assert_eq!(p.window_stats(Utc::now()).physical_items, 0);
    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn sweeper_keeps_active_items() {
    let (p, _) = pipeline();

    p.push("Fresh headline inside the window", None, Utc::now())
        .await
        .expect("push");

    let handle = spawn_sweeper(p.clone(), StdDuration::from_secs(60));
    tokio::time::advance(StdDuration::from_millis(10)).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }

    let stats = p.window_stats(Utc::now());
    assert_eq!(stats.physical_items, 1);
    assert_eq!(stats.active_items, 1);
    handle.abort();
}
