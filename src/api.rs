use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::aggregate::MarketSentiment;
use crate::news::{NewsItem, SentimentLabel};
use crate::pipeline::{IngestError, NewsPipeline, WindowStats};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<NewsPipeline>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/push_news", post(push_news))
        .route("/get_news", get(get_news))
        .route("/get_news_detail/{id}", get(get_news_detail))
        .route("/get_market_sentiment", get(get_market_sentiment))
        .route("/debug/window", get(debug_window))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Structured error responses: `{error, message}` JSON bodies.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - empty or otherwise unusable push payload
    InvalidRequest(String),
    /// 409 - candidate matched a recently accepted item
    Duplicate(String),
    /// 502 - external classifier unreachable or returned malformed data
    Classification(String),
    /// 404 - id absent or logically expired
    NotFound(String),
    /// 500 - internal invariant violated
    Internal(String),
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            ApiError::Duplicate(msg) => (StatusCode::CONFLICT, "duplicate_rejected", msg),
            ApiError::Classification(msg) => {
                (StatusCode::BAD_GATEWAY, "classification_failed", msg)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_type.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Duplicate { .. } => ApiError::Duplicate(err.to_string()),
            IngestError::Classification(e) => ApiError::Classification(e.to_string()),
            IngestError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[derive(serde::Deserialize)]
struct PushNewsReq {
    raw_content: String,
    #[serde(default)]
    source_url: Option<String>,
}

#[derive(serde::Serialize)]
struct PushNewsResponse {
    status: &'static str,
    message: &'static str,
    id: u64,
}

async fn push_news(
    State(state): State<AppState>,
    Json(body): Json<PushNewsReq>,
) -> Result<Json<PushNewsResponse>, ApiError> {
    if body.raw_content.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "raw_content must not be empty".to_string(),
        ));
    }

    let id = state
        .pipeline
        .push(&body.raw_content, body.source_url, Utc::now())
        .await?;

    Ok(Json(PushNewsResponse {
        status: "success",
        message: "News received and analyzed.",
        id,
    }))
}

/// Feed view of one item. `raw_content` is present only for major news; the
/// redaction decision was made once at write time and is not recomputed here.
#[derive(serde::Serialize)]
struct NewsItemView {
    id: u64,
    summary: String,
    sentiment_label: SentimentLabel,
    sentiment_score: f64,
    mentioned_coins: BTreeSet<String>,
    source_url: Option<String>,
    received_at: DateTime<Utc>,
    is_major: bool,
    raw_content: Option<String>,
}

impl From<NewsItem> for NewsItemView {
    fn from(it: NewsItem) -> Self {
        let raw_content = it.is_major.then_some(it.raw_content);
        Self {
            id: it.id,
            summary: it.summary,
            sentiment_label: it.sentiment_label,
            sentiment_score: it.sentiment_score,
            mentioned_coins: it.mentioned_coins,
            source_url: it.source_url,
            received_at: it.received_at,
            is_major: it.is_major,
            raw_content,
        }
    }
}

async fn get_news(State(state): State<AppState>) -> Json<Vec<NewsItemView>> {
    let items = state.pipeline.news_feed(Utc::now());
    Json(items.into_iter().map(NewsItemView::from).collect())
}

/// Detail lookup is an explicit request by id and is never redacted.
async fn get_news_detail(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<NewsItem>, ApiError> {
    state
        .pipeline
        .news_detail(id, Utc::now())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no active news item with id {id}")))
}

#[derive(serde::Serialize)]
struct MarketSentimentResponse {
    market_sentiment_normalized: Option<f64>,
    news_count: usize,
    max_score: Option<f64>,
    min_score: Option<f64>,
    max_score_news_id: Option<u64>,
    min_score_news_id: Option<u64>,
}

impl MarketSentimentResponse {
    /// An empty window is "no data", not a fabricated neutral score.
    fn from_aggregate(ms: Option<MarketSentiment>) -> Self {
        match ms {
            Some(ms) => Self {
                market_sentiment_normalized: Some(ms.market_sentiment_normalized),
                news_count: ms.news_count,
                max_score: Some(ms.max_score),
                min_score: Some(ms.min_score),
                max_score_news_id: Some(ms.max_score_news_id),
                min_score_news_id: Some(ms.min_score_news_id),
            },
            None => Self {
                market_sentiment_normalized: None,
                news_count: 0,
                max_score: None,
                min_score: None,
                max_score_news_id: None,
                min_score_news_id: None,
            },
        }
    }
}

async fn get_market_sentiment(State(state): State<AppState>) -> Json<MarketSentimentResponse> {
    let ms = state.pipeline.market_sentiment(Utc::now());
    Json(MarketSentimentResponse::from_aggregate(ms))
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "crypto news sentiment service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "push_news": "POST /push_news",
            "get_news": "GET /get_news",
            "get_news_detail": "GET /get_news_detail/{id}",
            "get_market_sentiment": "GET /get_market_sentiment",
            "health": "GET /health"
        }
    }))
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

async fn debug_window(State(state): State<AppState>) -> Json<WindowStats> {
    Json(state.pipeline.window_stats(Utc::now()))
}
