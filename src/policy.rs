// src/policy.rs
//! Major-news policy: a sentiment score strictly outside the configured
//! [low, high] band marks an item as major.
//!
//! The verdict is computed once at write time and stored as `is_major`; list
//! responses expose `raw_content` only for major items. Pure logic, no I/O.

pub const DEFAULT_MAJOR_LOW: f64 = 0.2;
pub const DEFAULT_MAJOR_HIGH: f64 = 0.8;

/// True iff `score < low || score > high`. Boundary scores are NOT major.
pub fn classify_major(sentiment_score: f64, low_threshold: f64, high_threshold: f64) -> bool {
    sentiment_score < low_threshold || sentiment_score > high_threshold
}
