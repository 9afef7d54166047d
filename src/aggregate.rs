// src/aggregate.rs
//! # Sentiment Aggregator
//! Pure, testable logic that maps the current active set to a market-wide
//! sentiment summary. No I/O, recomputed from scratch on every call — the
//! active set changes continuously as items expire, so there is no cached
//! running statistic to go stale.

use serde::Serialize;

use crate::news::NewsItem;

/// Market-wide summary over the live window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSentiment {
    /// Arithmetic mean of the sentiment scores, rounded to 4 decimals.
    pub market_sentiment_normalized: f64,
    pub news_count: usize,
    pub max_score: f64,
    pub min_score: f64,
    pub max_score_news_id: u64,
    pub min_score_news_id: u64,
}

/// Aggregate the active set; `None` when it is empty, so callers can
/// distinguish "no news" from "neutral news".
pub fn market_sentiment(active: &[NewsItem]) -> Option<MarketSentiment> {
    let first = active.first()?;

    let mut sum = 0.0f64;
    let mut max = first;
    let mut min = first;
    for it in active {
        sum += it.sentiment_score;
        if it.sentiment_score > max.sentiment_score
            || (it.sentiment_score == max.sentiment_score && earlier(it, max))
        {
            max = it;
        }
        if it.sentiment_score < min.sentiment_score
            || (it.sentiment_score == min.sentiment_score && earlier(it, min))
        {
            min = it;
        }
    }

    Some(MarketSentiment {
        market_sentiment_normalized: round4(sum / active.len() as f64),
        news_count: active.len(),
        max_score: max.sentiment_score,
        min_score: min.sentiment_score,
        max_score_news_id: max.id,
        min_score_news_id: min.id,
    })
}

/// Tie-break: the item with the earliest `received_at` wins (then smallest id).
fn earlier(a: &NewsItem, b: &NewsItem) -> bool {
    (a.received_at, a.id) < (b.received_at, b.id)
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::SentimentLabel;
    use chrono::{DateTime, Duration, Utc};

    fn item(id: u64, received_at: DateTime<Utc>, score: f64) -> NewsItem {
        NewsItem {
            id,
            raw_content: format!("raw {id}"),
            source_url: None,
            received_at,
            summary: format!("summary {id}"),
            sentiment_label: SentimentLabel::from_score(score),
            sentiment_score: score,
            mentioned_coins: Default::default(),
            is_major: false,
        }
    }

    #[test]
    fn empty_set_yields_no_data() {
        assert_eq!(market_sentiment(&[]), None);
    }

    #[test]
    fn two_item_summary_matches_expected_values() {
        let t0 = Utc::now();
        let active = vec![
            item(1, t0, 0.85),
            item(2, t0 + Duration::minutes(1), 0.35),
        ];
        let ms = market_sentiment(&active).unwrap();
        assert_eq!(ms.market_sentiment_normalized, 0.60);
        assert_eq!(ms.news_count, 2);
        assert_eq!(ms.max_score, 0.85);
        assert_eq!(ms.max_score_news_id, 1);
        assert_eq!(ms.min_score, 0.35);
        assert_eq!(ms.min_score_news_id, 2);
    }

    #[test]
    fn mean_is_rounded_to_four_decimals() {
        let t0 = Utc::now();
        let active = vec![item(1, t0, 0.1), item(2, t0, 0.1), item(3, t0, 0.2)];
        let ms = market_sentiment(&active).unwrap();
        assert_eq!(ms.market_sentiment_normalized, 0.1333);
    }

    #[test]
    fn ties_resolve_to_earliest_received() {
        let t0 = Utc::now();
        let active = vec![
            item(2, t0 + Duration::minutes(5), 0.9),
            item(1, t0, 0.9),
            item(3, t0 + Duration::minutes(2), 0.9),
        ];
        let ms = market_sentiment(&active).unwrap();
        assert_eq!(ms.max_score_news_id, 1);
        assert_eq!(ms.min_score_news_id, 1);
    }

    #[test]
    fn single_item_is_its_own_extremes() {
        let active = vec![item(7, Utc::now(), 0.42)];
        let ms = market_sentiment(&active).unwrap();
        assert_eq!(ms.news_count, 1);
        assert_eq!(ms.market_sentiment_normalized, 0.42);
        assert_eq!(ms.max_score_news_id, 7);
        assert_eq!(ms.min_score_news_id, 7);
    }
}
