//! Structured logging with context tags
//!
//! The share pipeline runs every submission inside a span carrying the miner, job and
//! extranonce1 so rejections can be traced back to a connection.

use crate::error::{Error, Result};
use tracing::{Span, field, info_span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Supported output formats
pub const LOG_FORMATS: [&str; 3] = ["plain", "pretty", "json"];

/// Context tags for structured logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    /// Miner id
    pub miner: Option<u32>,
    /// Job id as submitted
    pub job_id: Option<String>,
    /// Miner's extranonce1
    pub extra_nonce1: Option<u32>,
}

impl LogContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add miner id to context
    pub fn with_miner(mut self, miner: u32) -> Self {
        self.miner = Some(miner);
        self
    }

    /// Add job id to context
    pub fn with_job_id(mut self, job_id: &str) -> Self {
        self.job_id = Some(job_id.to_string());
        self
    }

    /// Add extranonce1 to context
    pub fn with_extra_nonce1(mut self, extra_nonce1: u32) -> Self {
        self.extra_nonce1 = Some(extra_nonce1);
        self
    }

    /// Create a tracing span with this context
    pub fn span(&self, name: &str) -> Span {
        let span = info_span!(
            "context",
            name = %name,
            miner = field::Empty,
            job_id = field::Empty,
            extranonce1 = field::Empty
        );

        if let Some(miner) = self.miner {
            span.record("miner", field::display(miner));
        }
        if let Some(ref job_id) = self.job_id {
            span.record("job_id", field::display(job_id));
        }
        if let Some(extra_nonce1) = self.extra_nonce1 {
            span.record("extranonce1", format!("{:08x}", extra_nonce1).as_str());
        }

        span
    }
}

/// Install the global subscriber
///
/// `level` is an `EnvFilter` directive; an unparsable one falls back to `info`.
pub fn init_logging(level: &str, format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match format {
        "json" => registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init(),
        "pretty" => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        "plain" => registry.with(fmt::layer().with_target(false)).try_init(),
        other => {
            return Err(Error::config(format!(
                "Unknown log format {}, expected one of {}",
                other,
                LOG_FORMATS.join(", ")
            )));
        }
    };

    installed.map_err(|e| Error::other(format!("Failed to install logger: {}", e)))
}
