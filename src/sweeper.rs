// src/sweeper.rs
//! Periodic retention sweep: a background task that physically evicts expired
//! items from the store and prunes the dedup cache on the same cadence.
//!
//! Reads already filter by age, so the sweep only reclaims memory. The
//! returned `JoinHandle` is the cancellation hook for clean shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::pipeline::NewsPipeline;

pub fn spawn_sweeper(pipeline: Arc<NewsPipeline>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let stats = pipeline.sweep(Utc::now());
            tracing::info!(
                target: "sweeper",
                removed = stats.removed,
                pruned = stats.pruned,
                "retention sweep tick"
            );
        }
    })
}
