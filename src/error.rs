//! Error types for the station pipeline.
//!
//! Each stage fails with its own enum so callers can tell a malformed
//! parameter file from an unreachable data service. [`PipelineError`] wraps
//! them for the orchestration layer.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or missing station configuration. Fatal for that station.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read parameter file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid parameter file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration for station '{station}': {reason}")]
    Invalid { station: String, reason: String },
}

impl ConfigError {
    pub fn invalid(station: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            station: station.into(),
            reason: reason.into(),
        }
    }
}

/// A remote query failed. Recoverable per station: the station is reported
/// unavailable and nothing is written for it.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not parse response from {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl TransportError {
    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// The trend regression could not be computed. Never leaves the slope
/// estimator; it surfaces as a missing slope instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("need at least {required} finite points to fit a line, found {found}")]
    InsufficientData { required: usize, found: usize },

    #[error("regression is degenerate (zero variance in sample index)")]
    Degenerate,
}

/// Writing the JSON payload or a ledger record failed.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to append run record: {0}")]
    Csv(#[from] csv::Error),
}

/// Any failure of a single station run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl PipelineError {
    /// Short machine-readable label used in the run ledger.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config_error",
            PipelineError::Transport(_) => "transport_error",
            PipelineError::Export(_) => "export_error",
        }
    }
}
