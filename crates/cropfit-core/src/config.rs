use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CropfitError, Result};
use crate::report::DEFAULT_NODATA_MARKER;
use crate::sampler::CellSelection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// The three rasters every run samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterPaths {
    /// Soil salinity (EC).
    pub salinity: PathBuf,
    pub slope: PathBuf,
    /// Land suitability index; reported, never used for matching.
    pub suitability: PathBuf,
}

impl Default for RasterPaths {
    fn default() -> Self {
        Self {
            salinity: PathBuf::from("Rasters/salinity classified.tif"),
            slope: PathBuf::from("Rasters/slope classified.tif"),
            suitability: PathBuf::from("Rasters/sutability.tif"),
        }
    }
}

/// Everything a run needs. Any key may be omitted from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Field polygons. None runs the built-in demo fields.
    pub fields: Option<PathBuf>,
    pub rules: PathBuf,
    pub rasters: RasterPaths,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub cell_selection: CellSelection,
    /// Use the demo fields when the field file cannot be read.
    pub demo_fallback: bool,
    pub nodata_marker: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fields: None,
            rules: PathBuf::from("crop recomendation list.csv"),
            rasters: RasterPaths::default(),
            output: PathBuf::from("recommended_crops.csv"),
            format: OutputFormat::Csv,
            cell_selection: CellSelection::Center,
            demo_fallback: true,
            nodata_marker: DEFAULT_NODATA_MARKER.to_string(),
        }
    }
}

impl RunConfig {
    /// Load a JSON run config. Missing keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CropfitError::InvalidConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| CropfitError::InvalidConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
