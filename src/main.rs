//! Crypto News Sentiment Service — Binary Entrypoint
//! Boots the Axum HTTP server: config, classifier, pipeline, sweeper, routes.

use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crypto_news_analyzer::api::{self, AppState};
use crypto_news_analyzer::classifier::{DeepSeekClassifier, NewsClassifier};
use crypto_news_analyzer::config::AppConfig;
use crypto_news_analyzer::metrics::Metrics;
use crypto_news_analyzer::pipeline::NewsPipeline;
use crypto_news_analyzer::sweeper;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crypto_news_analyzer=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    // ConfigInvalid is fatal: the process must not start serving with a
    // broken retention window or major-news band.
    let config = AppConfig::load().expect("invalid configuration");
    if config.deepseek_api_key.is_none() {
        tracing::warn!(
            "DEEPSEEK_API_KEY is not set; every push will fail classification"
        );
    }

    let metrics = Metrics::init(config.retention_secs);

    let classifier: Arc<dyn NewsClassifier> = Arc::new(DeepSeekClassifier::from_config(&config));
    let pipeline = Arc::new(NewsPipeline::new(&config, classifier));

    // Background eviction; handle doubles as the shutdown hook.
    let _sweeper = sweeper::spawn_sweeper(
        pipeline.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );

    let state = AppState { pipeline };
    let router = api::create_router(state).merge(metrics.router());

    Ok(router.into())
}
