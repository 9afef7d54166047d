//! # News Data Model
//! The unit of record (`NewsItem`) and the AI-derived annotation attached to it.
//!
//! A `NewsItem` only ever exists fully annotated: the pipeline builds it after
//! the classifier call succeeds, so queries never observe a partial item.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentiment verdict for a single news item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }

    /// Parse the classifier's label string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(SentimentLabel::Positive),
            "neutral" => Some(SentimentLabel::Neutral),
            "negative" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }

    /// Infer a label from the normalized score (> 0.6 positive, < 0.4 negative).
    /// Used when the classifier returns a non-standard label string.
    pub fn from_score(score: f64) -> Self {
        if score > 0.6 {
            SentimentLabel::Positive
        } else if score < 0.4 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

/// AI-derived fields produced by the classification gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub summary: String,
    pub sentiment_label: SentimentLabel,
    /// Normalized score in [0.0, 1.0]; higher = more bullish.
    pub sentiment_score: f64,
    pub mentioned_coins: BTreeSet<String>,
}

/// A fully annotated news item held by the windowed store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    /// Assigned at ingestion, monotonic within the process, never reused.
    pub id: u64,
    /// Original submitted text; immutable after creation.
    pub raw_content: String,
    pub source_url: Option<String>,
    /// Sole field used for retention eviction.
    pub received_at: DateTime<Utc>,
    pub summary: String,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: f64,
    pub mentioned_coins: BTreeSet<String>,
    /// Frozen at annotation time from the thresholds active then.
    pub is_major: bool,
}

/// Trim, uppercase and deduplicate ticker symbols reported by the classifier.
pub fn normalize_coins<I>(coins: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = String>,
{
    coins
        .into_iter()
        .filter_map(|c| {
            let t = c.trim().to_ascii_uppercase();
            if t.is_empty() {
                None
            } else {
                Some(t)
            }
        })
        .collect()
}
