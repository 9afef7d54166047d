// src/config.rs
//! Startup configuration: defaults ← optional TOML file ← env overrides.
//!
//! Loaded once at process start and passed explicitly into the components;
//! never re-read at call time. Invalid thresholds are fatal — the process
//! must not start serving with a broken retention or major-news band.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::policy::{DEFAULT_MAJOR_HIGH, DEFAULT_MAJOR_LOW};

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/news.toml";

pub const DEFAULT_RETENTION_SECS: u64 = 3600;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.80;
pub const DEFAULT_DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";

/// Immutable application configuration, validated at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// How long an item stays query-visible after `received_at`.
    pub retention_secs: u64,
    /// Cadence of the background eviction sweep.
    pub sweep_interval_secs: u64,
    /// Normalized similarity at or above which a candidate is a duplicate.
    pub similarity_threshold: f64,
    /// Scores strictly below this are major (bearish shock).
    pub major_low: f64,
    /// Scores strictly above this are major (bullish shock).
    pub major_high: f64,
    /// Dedup cache lookback; must cover at least the retention window
    /// so duplicates of already-expired items are still caught.
    pub dedup_lookback_secs: u64,
    pub deepseek_api_base: String,
    pub deepseek_model: String,
    /// Absent key is not fatal: classification then fails per-request.
    pub deepseek_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            major_low: DEFAULT_MAJOR_LOW,
            major_high: DEFAULT_MAJOR_HIGH,
            dedup_lookback_secs: 2 * DEFAULT_RETENTION_SECS,
            deepseek_api_base: DEFAULT_DEEPSEEK_API_BASE.to_string(),
            deepseek_model: DEFAULT_DEEPSEEK_MODEL.to_string(),
            deepseek_api_key: None,
        }
    }
}

/// Optional overrides from the TOML file; anything absent keeps its default.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    retention_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    similarity_threshold: Option<f64>,
    major_low: Option<f64>,
    major_high: Option<f64>,
    dedup_lookback_secs: Option<u64>,
    deepseek_api_base: Option<String>,
    deepseek_model: Option<String>,
}

impl AppConfig {
    /// Load using env path + fallback:
    /// 1) `$NEWS_CONFIG_PATH` (must exist if set)
    /// 2) `config/news.toml` if present
    /// 3) built-in defaults
    /// then apply env var overrides and validate.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        // Lookback defaults to 2x retention, so only pin it once we know
        // whether file/env set it explicitly.
        let mut lookback: Option<u64> = None;

        if let Some(file) = read_file_config()? {
            apply(&mut cfg.retention_secs, file.retention_secs);
            apply(&mut cfg.sweep_interval_secs, file.sweep_interval_secs);
            apply(&mut cfg.similarity_threshold, file.similarity_threshold);
            apply(&mut cfg.major_low, file.major_low);
            apply(&mut cfg.major_high, file.major_high);
            apply(&mut cfg.deepseek_api_base, file.deepseek_api_base);
            apply(&mut cfg.deepseek_model, file.deepseek_model);
            if file.dedup_lookback_secs.is_some() {
                lookback = file.dedup_lookback_secs;
            }
        }

        env_override("NEWS_RETENTION_SECS", &mut cfg.retention_secs)?;
        env_override("NEWS_SWEEP_INTERVAL_SECS", &mut cfg.sweep_interval_secs)?;
        env_override("NEWS_SIMILARITY_THRESHOLD", &mut cfg.similarity_threshold)?;
        env_override("NEWS_MAJOR_LOW", &mut cfg.major_low)?;
        env_override("NEWS_MAJOR_HIGH", &mut cfg.major_high)?;
        if let Ok(v) = std::env::var("NEWS_DEDUP_LOOKBACK_SECS") {
            lookback = Some(
                v.parse()
                    .map_err(|e| anyhow!("NEWS_DEDUP_LOOKBACK_SECS: invalid value {v:?}: {e}"))?,
            );
        }
        if let Ok(v) = std::env::var("DEEPSEEK_API_BASE") {
            cfg.deepseek_api_base = v;
        }
        if let Ok(v) = std::env::var("DEEPSEEK_MODEL") {
            cfg.deepseek_model = v;
        }
        cfg.deepseek_api_key = std::env::var("DEEPSEEK_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        cfg.dedup_lookback_secs = lookback.unwrap_or(cfg.retention_secs.saturating_mul(2));

        cfg.validate()?;
        Ok(cfg)
    }

    /// Fatal startup checks (ConfigInvalid): thresholds in range and ordered,
    /// windows non-zero, lookback covering at least the retention window.
    pub fn validate(&self) -> Result<()> {
        if self.retention_secs == 0 {
            bail!("retention_secs must be > 0");
        }
        if self.sweep_interval_secs == 0 {
            bail!("sweep_interval_secs must be > 0");
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            bail!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.major_low) {
            bail!("major_low must be within [0, 1], got {}", self.major_low);
        }
        if !(0.0..=1.0).contains(&self.major_high) {
            bail!("major_high must be within [0, 1], got {}", self.major_high);
        }
        if self.major_low >= self.major_high {
            bail!(
                "major_low ({}) must be strictly below major_high ({})",
                self.major_low,
                self.major_high
            );
        }
        if self.dedup_lookback_secs < self.retention_secs {
            bail!(
                "dedup_lookback_secs ({}) must cover at least retention_secs ({})",
                self.dedup_lookback_secs,
                self.retention_secs
            );
        }
        Ok(())
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs as i64)
    }

    pub fn dedup_lookback(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_lookback_secs as i64)
    }
}

fn read_file_config() -> Result<Option<FileConfig>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("NEWS_CONFIG_PATH points to non-existent path");
        }
        return parse_file(&pb).map(Some);
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
    if fallback.exists() {
        return parse_file(&fallback).map(Some);
    }
    Ok(None)
}

fn parse_file(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config from {}", path.display()))
}

fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn env_override<T>(key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(v) = std::env::var(key) {
        *slot = v
            .parse()
            .map_err(|e| anyhow!("{key}: invalid value {v:?}: {e}"))?;
    }
    Ok(())
}
