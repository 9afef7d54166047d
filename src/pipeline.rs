// src/pipeline.rs
//! Ingestion pipeline: dedup gate → classification gateway → major-news tag →
//! windowed store, plus the read-throughs the HTTP layer queries.
//!
//! Locking discipline: the dedup cache and the store each have their own lock,
//! acquired in that fixed order and never held simultaneously or across the
//! classifier await. The dedup commit is deferred until classification
//! succeeds, so a failed push leaves no trace and the same text stays
//! retryable.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use thiserror::Error;

use crate::aggregate::{self, MarketSentiment};
use crate::classifier::{ClassifyError, NewsClassifier};
use crate::config::AppConfig;
use crate::dedup::SimilarityDedup;
use crate::news::NewsItem;
use crate::policy::classify_major;
use crate::store::{NewsStore, StoreError};

/// Structured push outcomes; never silently retried inside the core.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Candidate matched a recently accepted item; no state change.
    #[error("duplicate of a recently accepted item (similarity {similarity:.2})")]
    Duplicate { similarity: f64 },
    /// Gateway failure; no partial item committed, text stays retryable.
    #[error(transparent)]
    Classification(#[from] ClassifyError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Window diagnostics for the debug endpoint and sweeper logs.
#[derive(Debug, Serialize)]
pub struct WindowStats {
    pub retention_secs: i64,
    pub active_items: usize,
    pub physical_items: usize,
    pub dedup_cached_texts: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SweepStats {
    pub removed: usize,
    pub pruned: usize,
}

pub struct NewsPipeline {
    dedup: SimilarityDedup,
    classifier: Arc<dyn NewsClassifier>,
    store: NewsStore,
    major_low: f64,
    major_high: f64,
}

impl NewsPipeline {
    pub fn new(config: &AppConfig, classifier: Arc<dyn NewsClassifier>) -> Self {
        Self {
            dedup: SimilarityDedup::new(config.dedup_lookback(), config.similarity_threshold),
            classifier,
            store: NewsStore::new(config.retention()),
            major_low: config.major_low,
            major_high: config.major_high,
        }
    }

    /// Ingest one pushed item. Returns the assigned id on acceptance.
    pub async fn push(
        &self,
        raw_content: &str,
        source_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<u64, IngestError> {
        let digest = content_digest(raw_content);

        if let Some(similarity) = self.dedup.matches(raw_content, now) {
            counter!("news_rejected_duplicate_total").increment(1);
            tracing::info!(
                target: "pipeline",
                %digest,
                similarity,
                "duplicate rejected"
            );
            return Err(IngestError::Duplicate { similarity });
        }

        // External I/O happens with no locks held.
        let started = Instant::now();
        let annotation = match self.classifier.classify(raw_content).await {
            Ok(a) => a,
            Err(e) => {
                counter!("news_rejected_classify_total").increment(1);
                tracing::warn!(
                    target: "pipeline",
                    %digest,
                    provider = self.classifier.name(),
                    error = %e,
                    "classification failed, push rejected"
                );
                return Err(e.into());
            }
        };
        histogram!("classify_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        let is_major = classify_major(annotation.sentiment_score, self.major_low, self.major_high);

        // Commit order: dedup cache first, then the store; never nested.
        self.dedup.remember(raw_content, now);

        let id = self.store.allocate_id();
        let item = NewsItem {
            id,
            raw_content: raw_content.to_string(),
            source_url,
            received_at: now,
            summary: annotation.summary,
            sentiment_label: annotation.sentiment_label,
            sentiment_score: annotation.sentiment_score,
            mentioned_coins: annotation.mentioned_coins,
            is_major,
        };
        self.store.insert(item)?;

        counter!("news_accepted_total").increment(1);
        tracing::info!(
            target: "pipeline",
            %digest,
            id,
            score = annotation.sentiment_score,
            is_major,
            "news accepted"
        );
        Ok(id)
    }

    /// Active items, oldest first.
    pub fn news_feed(&self, now: DateTime<Utc>) -> Vec<NewsItem> {
        self.store.list_active(now)
    }

    /// Full detail by id; `None` when absent or logically expired.
    pub fn news_detail(&self, id: u64, now: DateTime<Utc>) -> Option<NewsItem> {
        self.store.get(id, now)
    }

    /// Aggregate over the current active set; `None` when the window is empty.
    pub fn market_sentiment(&self, now: DateTime<Utc>) -> Option<MarketSentiment> {
        aggregate::market_sentiment(&self.store.list_active(now))
    }

    /// One garbage-collection pass over the store and the dedup cache.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepStats {
        let removed = self.store.sweep(now);
        let pruned = self.dedup.prune(now);
        counter!("news_swept_total").increment(removed as u64);
        gauge!("news_active_items").set(self.store.physical_len() as f64);
        gauge!("dedup_cached_texts").set(self.dedup.len() as f64);
        SweepStats { removed, pruned }
    }

    pub fn window_stats(&self, now: DateTime<Utc>) -> WindowStats {
        WindowStats {
            retention_secs: self.store.retention().num_seconds(),
            active_items: self.store.list_active(now).len(),
            physical_items: self.store.physical_len(),
            dedup_cached_texts: self.dedup.len(),
        }
    }
}

/// Short anonymized digest for log lines. Raw news text is never logged.
fn content_digest(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
