// src/store.rs
//! Windowed store: the system of record for annotated news items.
//!
//! Items are keyed by id and visible only while their age stays within the
//! retention window. Read paths apply the age filter themselves, so the
//! periodic sweep is memory reclamation, not a correctness mechanism — an
//! item can be logically expired long before it is physically removed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::news::NewsItem;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Insert conflict; the store never holds two items with the same id.
    #[error("item {0} already present")]
    DuplicateId(u64),
}

/// Lock-protected map of annotated items plus the id allocator.
#[derive(Debug)]
pub struct NewsStore {
    inner: RwLock<BTreeMap<u64, NewsItem>>,
    next_id: AtomicU64,
    retention: Duration,
}

impl NewsStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            retention,
        }
    }

    /// Monotonic id, never reused within the process lifetime.
    pub fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Add an item; visible to queries immediately. Conflicting ids are a
    /// no-op signalled to the caller.
    pub fn insert(&self, item: NewsItem) -> Result<(), StoreError> {
        let mut map = self.inner.write().expect("store rwlock poisoned");
        if map.contains_key(&item.id) {
            return Err(StoreError::DuplicateId(item.id));
        }
        map.insert(item.id, item);
        Ok(())
    }

    /// The item, but only if present AND not logically expired.
    pub fn get(&self, id: u64, now: DateTime<Utc>) -> Option<NewsItem> {
        let map = self.inner.read().expect("store rwlock poisoned");
        map.get(&id)
            .filter(|it| self.is_active(it, now))
            .cloned()
    }

    /// All active items, ordered by `received_at` ascending (ties: id
    /// ascending) so aggregation and display are reproducible per snapshot.
    pub fn list_active(&self, now: DateTime<Utc>) -> Vec<NewsItem> {
        let map = self.inner.read().expect("store rwlock poisoned");
        let mut items: Vec<NewsItem> = map
            .values()
            .filter(|it| self.is_active(it, now))
            .cloned()
            .collect();
        items.sort_by(|a, b| (a.received_at, a.id).cmp(&(b.received_at, b.id)));
        items
    }

    /// Physically remove expired items; returns how many were dropped.
    /// Idempotent: a second pass with the same `now` removes nothing.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.inner.write().expect("store rwlock poisoned");
        let before = map.len();
        map.retain(|_, it| self.is_active(it, now));
        before - map.len()
    }

    /// Item count regardless of logical expiry (diagnostics only).
    pub fn physical_len(&self) -> usize {
        self.inner.read().expect("store rwlock poisoned").len()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn is_active(&self, item: &NewsItem, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(item.received_at) <= self.retention
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::SentimentLabel;

    fn item(id: u64, received_at: DateTime<Utc>, score: f64) -> NewsItem {
        NewsItem {
            id,
            raw_content: format!("raw content {id}"),
            source_url: None,
            received_at,
            summary: format!("summary {id}"),
            sentiment_label: SentimentLabel::from_score(score),
            sentiment_score: score,
            mentioned_coins: Default::default(),
            is_major: false,
        }
    }

    fn store() -> NewsStore {
        NewsStore::new(Duration::hours(1))
    }

    #[test]
    fn allocated_ids_are_monotonic() {
        let s = store();
        let a = s.allocate_id();
        let b = s.allocate_id();
        assert!(b > a);
    }

    #[test]
    fn insert_conflict_is_signalled_and_keeps_original() {
        let s = store();
        let now = Utc::now();
        s.insert(item(1, now, 0.5)).unwrap();
        let err = s.insert(item(1, now, 0.9)).unwrap_err();
        assert_eq!(err, StoreError::DuplicateId(1));
        assert_eq!(s.get(1, now).unwrap().sentiment_score, 0.5);
    }

    #[test]
    fn get_hides_logically_expired_items() {
        let s = store();
        let t0 = Utc::now();
        s.insert(item(1, t0, 0.5)).unwrap();
        assert!(s.get(1, t0 + Duration::minutes(30)).is_some());
        // expired but not yet swept: still hidden from reads
        assert!(s.get(1, t0 + Duration::minutes(61)).is_none());
        assert_eq!(s.physical_len(), 1);
    }

    #[test]
    fn eviction_boundary_is_inclusive() {
        let s = store();
        let t0 = Utc::now();
        s.insert(item(1, t0, 0.5)).unwrap();
        let window = Duration::hours(1);
        let eps = Duration::seconds(1);
        assert!(s.get(1, t0 + window - eps).is_some());
        assert!(s.get(1, t0 + window).is_some());
        assert!(s.get(1, t0 + window + eps).is_none());
    }

    #[test]
    fn list_active_orders_by_received_at_then_id() {
        let s = store();
        let t0 = Utc::now();
        s.insert(item(3, t0 + Duration::minutes(2), 0.5)).unwrap();
        s.insert(item(1, t0, 0.5)).unwrap();
        s.insert(item(2, t0 + Duration::minutes(2), 0.5)).unwrap();
        let ids: Vec<u64> = s
            .list_active(t0 + Duration::minutes(5))
            .iter()
            .map(|it| it.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn sweep_removes_only_expired_and_is_idempotent() {
        let s = store();
        let t0 = Utc::now();
        s.insert(item(1, t0 - Duration::hours(2), 0.5)).unwrap();
        s.insert(item(2, t0, 0.5)).unwrap();

        assert_eq!(s.sweep(t0), 1);
        assert_eq!(s.physical_len(), 1);

        let after_first: Vec<u64> = s.list_active(t0).iter().map(|it| it.id).collect();
        assert_eq!(s.sweep(t0), 0);
        let after_second: Vec<u64> = s.list_active(t0).iter().map(|it| it.id).collect();
        assert_eq!(after_first, after_second);
    }
}
