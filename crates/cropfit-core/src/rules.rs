use std::fs;
use std::io::Read;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{CropfitError, Result};

/// Column names the rule table must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = ["Crop", "EC_max", "Slope_max"];

/// Per-crop tolerance thresholds. Extra CSV columns are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRule {
    #[serde(rename = "Crop")]
    pub crop: String,
    /// Highest tolerated average salinity (electrical conductivity).
    #[serde(rename = "EC_max")]
    pub ec_max: f64,
    /// Highest tolerated average slope.
    #[serde(rename = "Slope_max")]
    pub slope_max: f64,
}

impl CropRule {
    pub fn new(crop: impl Into<String>, ec_max: f64, slope_max: f64) -> Self {
        Self {
            crop: crop.into(),
            ec_max,
            slope_max,
        }
    }
}

/// Load the crop rule table from a CSV file, preserving row order.
pub fn load_rules(path: &Path) -> Result<Vec<CropRule>> {
    let file = fs::File::open(path).map_err(|source| CropfitError::RuleTableUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = read_rules(file, &path.display().to_string())?;
    info!("Loaded {} crop rule(s) from {}", rules.len(), path.display());
    Ok(rules)
}

/// Parse a rule table from any reader. `source_name` only labels errors.
pub fn read_rules<R: Read>(reader: R, source_name: &str) -> Result<Vec<CropRule>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(CropfitError::MissingRuleColumns {
            source_name: source_name.to_string(),
            missing: missing.join(", "),
        });
    }

    let mut rules = Vec::new();
    for result in rdr.deserialize::<CropRule>() {
        let rule = result.map_err(|e| CropfitError::InvalidRule {
            source_name: source_name.to_string(),
            row: e.position().map_or(0, |p| p.line()),
            reason: e.to_string(),
        })?;
        rules.push(rule);
    }
    Ok(rules)
}
