// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod api;
pub mod classifier;
pub mod config;
pub mod dedup;
pub mod metrics;
pub mod news;
pub mod pipeline;
pub mod policy;
pub mod store;
pub mod sweeper;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::pipeline::{IngestError, NewsPipeline};
