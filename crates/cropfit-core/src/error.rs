use std::path::PathBuf;

use thiserror::Error;

/// Every failure the recommendation pipeline can surface.
#[derive(Debug, Error)]
pub enum CropfitError {
    /// Vector file could not be parsed. Recoverable: callers may fall back
    /// to the demo field set.
    #[error("cannot read vector file {path}: {reason}")]
    UnreadableVectorFile { path: PathBuf, reason: String },

    #[error("raster file not found: {0}")]
    MissingRasterFile(PathBuf),

    #[error("cannot read raster {path}: {reason}")]
    UnreadableRaster { path: PathBuf, reason: String },

    #[error("cannot open crop rule table {path}: {source}")]
    RuleTableUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("crop rule table {source_name} is missing required column(s): {missing}")]
    MissingRuleColumns { source_name: String, missing: String },

    #[error("crop rule table {source_name}, row {row}: {reason}")]
    InvalidRule {
        source_name: String,
        row: u64,
        reason: String,
    },

    #[error("invalid run config {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CropfitError {
    pub(crate) fn vector(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::UnreadableVectorFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn raster(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::UnreadableRaster {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CropfitError>;
