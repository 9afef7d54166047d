// src/dedup.rs
//! Similarity deduplicator: heuristic suppression of near-duplicate pushes.
//!
//! Holds its own lightweight cache of recently accepted texts, independent of
//! the windowed store and pruned on a longer lookback (default 2x retention),
//! so a duplicate is still caught after the original has expired from the
//! primary store.
//!
//! Similarity: `strsim::normalized_levenshtein` over a canonicalized form of
//! the text. False positives and false negatives are acceptable outcomes —
//! this is a filter, not an exact-match index.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use strsim::normalized_levenshtein;

/// Thread-safe, age-pruned cache of recently accepted texts.
#[derive(Debug)]
pub struct SimilarityDedup {
    inner: Mutex<Inner>,
    lookback: Duration,
    threshold: f64,
}

#[derive(Debug)]
struct Inner {
    /// Canonicalized texts in insertion order as `(accepted_at, text)`.
    buf: VecDeque<(DateTime<Utc>, String)>,
}

impl SimilarityDedup {
    pub fn new(lookback: Duration, threshold: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buf: VecDeque::new(),
            }),
            lookback,
            threshold,
        }
    }

    /// Scan the cache for a near-duplicate of `text`; returns the similarity
    /// of the first cached text at or above the threshold. Short-circuits on
    /// the first hit — no requirement to find the best match.
    ///
    /// Does NOT record `text`; committing the candidate is `remember`'s job,
    /// deferred until classification succeeds so a failed push stays retryable.
    pub fn matches(&self, text: &str, now: DateTime<Utc>) -> Option<f64> {
        let candidate = canonicalize(text);
        let cutoff = now - self.lookback;

        let mut inner = self.inner.lock().expect("dedup cache mutex poisoned");
        prune_buf(&mut inner.buf, cutoff);

        for (_, cached) in inner.buf.iter() {
            let sim = normalized_levenshtein(&candidate, cached);
            if sim >= self.threshold {
                return Some(sim);
            }
        }
        None
    }

    pub fn is_duplicate(&self, text: &str, now: DateTime<Utc>) -> bool {
        self.matches(text, now).is_some()
    }

    /// Commit an accepted text to the cache.
    pub fn remember(&self, text: &str, now: DateTime<Utc>) {
        let canonical = canonicalize(text);
        let cutoff = now - self.lookback;

        let mut inner = self.inner.lock().expect("dedup cache mutex poisoned");
        prune_buf(&mut inner.buf, cutoff);
        inner.buf.push_back((now, canonical));
    }

    /// Drop entries older than the lookback; returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.lookback;
        let mut inner = self.inner.lock().expect("dedup cache mutex poisoned");
        prune_buf(&mut inner.buf, cutoff)
    }

    /// Number of cached texts (diagnostics/telemetry).
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("dedup cache mutex poisoned")
            .buf
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prune_buf(buf: &mut VecDeque<(DateTime<Utc>, String)>, cutoff: DateTime<Utc>) -> usize {
    let mut removed = 0usize;
    while let Some(&(t, _)) = buf.front() {
        if t < cutoff {
            buf.pop_front();
            removed += 1;
        } else {
            break;
        }
    }
    removed
}

/// Canonical comparison form: HTML entities decoded, tags stripped, whitespace
/// collapsed, lowercased, capped at 1500 chars. The stored `raw_content` is
/// never touched; this form exists only for similarity scoring.
pub fn canonicalize(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_ascii_lowercase();

    // 4) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}
