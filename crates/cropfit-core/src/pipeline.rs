//! Run orchestration: load inputs, sample every field, match crops.
//!
//! All rasters and the rule table are loaded before the first field is
//! sampled, so a bad input never leaves a partial report behind.
use log::{debug, info, warn};

use crate::config::{RasterPaths, RunConfig};
use crate::error::Result;
use crate::field::Field;
use crate::geotiff::read_geotiff;
use crate::matcher::recommend;
use crate::raster::Raster;
use crate::report::FieldResult;
use crate::rules::{load_rules, CropRule};
use crate::sampler::{zonal_stats, CellSelection};
use crate::source::{load_fields, FieldOrigin};

/// The three decoded rasters, held in memory for the whole run.
#[derive(Debug, Clone)]
pub struct RasterSet {
    pub salinity: Raster,
    pub slope: Raster,
    pub suitability: Raster,
}

impl RasterSet {
    /// Decode all three rasters. The first failure aborts the run.
    pub fn open(paths: &RasterPaths) -> Result<Self> {
        let set = Self {
            salinity: read_geotiff(&paths.salinity)?,
            slope: read_geotiff(&paths.slope)?,
            suitability: read_geotiff(&paths.suitability)?,
        };
        info!(
            "Opened rasters: salinity {}, slope {}, suitability {}",
            paths.salinity.display(),
            paths.slope.display(),
            paths.suitability.display()
        );
        Ok(set)
    }
}

fn sample_logged(name: &str, field: &Field, raster: &Raster, selection: CellSelection) -> Option<f64> {
    let stats = zonal_stats(raster, &field.geometry, selection);
    debug!(
        "{}: {name} mean={:?} over {} cell(s), {} no-data",
        field.id, stats.mean, stats.cells, stats.nodata_cells
    );
    if stats.mean.is_none() {
        warn!("{}: no valid {name} cells under the field", field.id);
    }
    stats.mean
}

/// Sample one field and match it against the rule table.
///
/// A field without a salinity or slope average gets no recommendation.
pub fn evaluate_field(
    field: &Field,
    rasters: &RasterSet,
    rules: &[CropRule],
    selection: CellSelection,
) -> FieldResult {
    let avg_salinity = sample_logged("salinity", field, &rasters.salinity, selection);
    let avg_slope = sample_logged("slope", field, &rasters.slope, selection);
    let avg_suitability = sample_logged("suitability", field, &rasters.suitability, selection);

    let recommended = match (avg_salinity, avg_slope) {
        (Some(sal), Some(slope)) => recommend(sal, slope, rules),
        _ => {
            warn!("{}: cannot evaluate without salinity and slope; no crops recommended", field.id);
            Vec::new()
        }
    };

    FieldResult {
        field_id: field.id.clone(),
        avg_salinity,
        avg_slope,
        avg_suitability,
        recommended,
    }
}

/// Evaluate every field. Output order equals input order.
pub fn run(
    fields: &[Field],
    rasters: &RasterSet,
    rules: &[CropRule],
    selection: CellSelection,
) -> Vec<FieldResult> {
    #[cfg(feature = "threading")]
    {
        use rayon::prelude::*;
        fields
            .par_iter()
            .map(|f| evaluate_field(f, rasters, rules, selection))
            .collect()
    }
    #[cfg(not(feature = "threading"))]
    {
        fields
            .iter()
            .map(|f| evaluate_field(f, rasters, rules, selection))
            .collect()
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub origin: FieldOrigin,
    pub results: Vec<FieldResult>,
}

/// Load every input named by `config` and evaluate all fields.
pub fn execute(config: &RunConfig) -> Result<RunOutput> {
    let loaded = load_fields(config.fields.as_deref(), config.demo_fallback)?;
    let rules = load_rules(&config.rules)?;
    let rasters = RasterSet::open(&config.rasters)?;

    info!(
        "Evaluating {} field(s) from {} against {} crop rule(s)",
        loaded.fields.len(),
        loaded.origin,
        rules.len()
    );
    let results = run(&loaded.fields, &rasters, &rules, config.cell_selection);
    let recommended = results.iter().filter(|r| !r.recommended.is_empty()).count();
    info!("{recommended} of {} field(s) have at least one suitable crop", results.len());

    Ok(RunOutput {
        origin: loaded.origin,
        results,
    })
}
