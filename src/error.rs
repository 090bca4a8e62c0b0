use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaveError {
    #[error("invalid wave configuration: {0}")]
    Config(String),

    #[error("wave has no sections to propagate through")]
    EmptySectionList,

    #[error("another caller is already propagating this wave")]
    AlreadyPropagating,

    #[error("failed to read wave config {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse wave config: {0}")]
    ParseConfig(#[from] serde_json::Error),
}

/// Failures of the per-section round trip with the column aggregator.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("column aggregator is no longer accepting sections")]
    AggregatorClosed,

    #[error("column aggregator did not report section {section_id} within {timeout_ms}ms")]
    TimedOut { section_id: String, timeout_ms: u64 },
}
