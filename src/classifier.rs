// src/classifier.rs
//! Classification gateway: sends raw news text to an external AI classifier
//! and validates the structured annotation it returns.
//!
//! The gateway owns the failure policy for that call: transport errors and
//! malformed responses fail the whole ingestion — no partially annotated item
//! is ever committed, and no retry happens inside the core.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::news::{normalize_coins, Annotation, SentimentLabel};

/// Gateway failure modes. Either one aborts the push as a whole.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Classifier unreachable, non-2xx status, or missing credentials.
    #[error("classifier transport error: {0}")]
    Transport(String),
    /// Response received but not in the contracted shape.
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// Boundary to the external AI classifier.
#[async_trait]
pub trait NewsClassifier: Send + Sync {
    async fn classify(&self, raw_content: &str) -> Result<Annotation, ClassifyError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

const SYSTEM_PROMPT: &str = "You are a professional cryptocurrency financial analyst. \
Analyze the following news item and respond with a JSON object containing: \
'summary' (a concise summary of the news), \
'sentiment' ('positive', 'negative' or 'neutral'), \
'sentiment_score' (normalized: 0.0 extremely bearish, 1.0 extremely bullish, 0.5 neutral), \
'mentioned_coins' (ticker symbols such as BTC, ETH, SOL; empty list if none). \
Output strictly the requested JSON.";

/// DeepSeek provider (OpenAI-compatible chat completions API).
pub struct DeepSeekClassifier {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl DeepSeekClassifier {
    pub fn from_config(config: &AppConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("crypto-news-analyzer/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_base: config.deepseek_api_base.trim_end_matches('/').to_string(),
            api_key: config.deepseek_api_key.clone().unwrap_or_default(),
            model: config.deepseek_model.clone(),
        }
    }
}

#[async_trait]
impl NewsClassifier for DeepSeekClassifier {
    async fn classify(&self, raw_content: &str) -> Result<Annotation, ClassifyError> {
        if self.api_key.is_empty() {
            return Err(ClassifyError::Transport(
                "DEEPSEEK_API_KEY is not set".to_string(),
            ));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            response_format: ResponseFormat<'a>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let user = format!("Analyze this news item:\n\n{raw_content}");
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.3,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClassifyError::Transport(format!(
                "classifier returned HTTP {status}"
            )));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ClassifyError::Malformed(format!("chat response: {e}")))?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ClassifyError::Malformed("empty choices".to_string()))?;

        parse_annotation(content)
    }

    fn name(&self) -> &'static str {
        "deepseek"
    }
}

/// Validate the classifier's JSON payload into an `Annotation`.
///
/// Strictness follows the ingestion contract: missing/mistyped required fields
/// and out-of-range scores are malformed-response failures (logged, never
/// silently clamped). Non-standard label strings and a non-list coins field
/// are tolerated with a warning.
pub fn parse_annotation(payload: &str) -> Result<Annotation, ClassifyError> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| ClassifyError::Malformed(format!("invalid JSON: {e}")))?;

    let summary = value
        .get("summary")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ClassifyError::Malformed("missing field 'summary'".to_string()))?
        .trim()
        .to_string();

    let sentiment_score = value
        .get("sentiment_score")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ClassifyError::Malformed("missing field 'sentiment_score'".to_string()))?;
    if !sentiment_score.is_finite() || !(0.0..=1.0).contains(&sentiment_score) {
        tracing::warn!(
            target: "classifier",
            score = sentiment_score,
            "classifier returned out-of-range sentiment_score"
        );
        return Err(ClassifyError::Malformed(format!(
            "sentiment_score out of range: {sentiment_score}"
        )));
    }

    let raw_label = value
        .get("sentiment")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ClassifyError::Malformed("missing field 'sentiment'".to_string()))?;
    let sentiment_label = match SentimentLabel::parse(raw_label) {
        Some(l) => l,
        None => {
            let inferred = SentimentLabel::from_score(sentiment_score);
            tracing::warn!(
                target: "classifier",
                label = raw_label,
                inferred = inferred.as_str(),
                "non-standard sentiment label, inferred from score"
            );
            inferred
        }
    };

    let mentioned_coins = match value.get("mentioned_coins") {
        Some(serde_json::Value::Array(items)) => normalize_coins(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string)),
        ),
        Some(_) | None => {
            tracing::warn!(
                target: "classifier",
                "mentioned_coins missing or not a list, treating as empty"
            );
            Default::default()
        }
    };

    Ok(Annotation {
        summary,
        sentiment_label,
        sentiment_score,
        mentioned_coins,
    })
}

/// Scripted classifier for tests and local runs: pops queued outcomes, and
/// falls back to a fixed neutral annotation once the script is exhausted.
pub struct MockClassifier {
    script: Mutex<VecDeque<Result<Annotation, ClassifyError>>>,
    fallback: Annotation,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Self::annotation(0.5),
        }
    }

    /// Fixed annotation with the label inferred from the score.
    pub fn annotation(score: f64) -> Annotation {
        Annotation {
            summary: format!("Mock summary (score {score})"),
            sentiment_label: SentimentLabel::from_score(score),
            sentiment_score: score,
            mentioned_coins: Default::default(),
        }
    }

    pub fn enqueue(&self, outcome: Result<Annotation, ClassifyError>) {
        self.script
            .lock()
            .expect("mock script mutex poisoned")
            .push_back(outcome);
    }

    pub fn enqueue_score(&self, score: f64) {
        self.enqueue(Ok(Self::annotation(score)));
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsClassifier for MockClassifier {
    async fn classify(&self, _raw_content: &str) -> Result<Annotation, ClassifyError> {
        let scripted = self
            .script
            .lock()
            .expect("mock script mutex poisoned")
            .pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => Ok(self.fallback.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
