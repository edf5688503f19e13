// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use storage_sys::SysError;
use thiserror::Error;

/// Collector-specific errors
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("failed to read config {path:?}: {reason}")]
    ConfigIo { path: PathBuf, reason: String },

    #[error("invalid config {path:?}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("unknown sub collector: {0}. Possible values: metrics, bitlocker_status")]
    UnknownSubCollector(String),

    #[error("invalid volume {kind} pattern '{pattern}': {source}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to initialize BitLocker worker: {0}")]
    BitlockerInit(#[source] SysError),

    #[error("failed to get volumes: {0}")]
    Volumes(#[source] SysError),

    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("failed to encode metrics: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, CollectorError>;
