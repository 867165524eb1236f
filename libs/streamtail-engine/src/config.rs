use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use streamtail_api::{Block, RecordId, StreamId};

use crate::backoff::{BackoffPolicy, RetryPolicy};
use crate::error::TailError;
use crate::sink::OutputStyle;
use crate::tail::TailSettings;

/// Per-tail options shared by the CLI flags and the `[[tails]]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TailOptions {
    /// Records requested per read.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Initial cursor when nothing is persisted (`0` = whole history).
    #[serde(default = "default_start")]
    pub start: String,

    #[serde(default)]
    pub output: OutputStyle,

    /// Persist the cursor here between runs. Memory only when unset.
    #[serde(default)]
    pub cursor_file: Option<PathBuf>,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_batch_size() -> usize {
    10
}

fn default_start() -> String {
    "0".to_string()
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            start: default_start(),
            output: OutputStyle::default(),
            cursor_file: None,
            retry: RetryConfig::default(),
        }
    }
}

impl TailOptions {
    /// Validate and resolve against a concrete stream key.
    pub fn settings(&self, stream: impl Into<StreamId>) -> Result<TailSettings, TailError> {
        if self.batch_size == 0 {
            return Err(TailError::Config("batch_size must be > 0".into()));
        }
        let start = self
            .start
            .parse::<RecordId>()
            .map_err(|e| TailError::Config(e.to_string()))?;

        Ok(TailSettings {
            stream: stream.into(),
            batch_size: self.batch_size,
            start,
            block: Block::Forever,
            retry: self.retry.policy()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    /// Consecutive transient failures tolerated (0 = fail on the first).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_first_ms")]
    pub first_ms: u64,

    #[serde(default = "default_max_ms")]
    pub max_ms: u64,

    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_first_ms() -> u64 {
    500
}

fn default_max_ms() -> u64 {
    30_000
}

fn default_factor() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            first_ms: default_first_ms(),
            max_ms: default_max_ms(),
            factor: default_factor(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy, TailError> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(TailError::Config(format!(
                "retry.factor must be >= 1.0, got {}",
                self.factor
            )));
        }
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            backoff: BackoffPolicy {
                first: Duration::from_millis(self.first_ms),
                max: Duration::from_millis(self.max_ms),
                factor: self.factor,
            },
        })
    }
}
