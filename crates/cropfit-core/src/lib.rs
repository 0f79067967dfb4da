//! Field-level crop recommendation from salinity, slope and suitability
//! rasters.
pub mod config;
pub mod error;
pub mod field;
pub mod geotiff;
pub mod matcher;
pub mod pipeline;
pub mod raster;
pub mod report;
pub mod rules;
pub mod sampler;
pub mod source;

pub use config::{OutputFormat, RasterPaths, RunConfig};
pub use error::{CropfitError, Result};
pub use field::Field;
pub use pipeline::{execute, RasterSet, RunOutput};
pub use report::{build_report, FieldResult, ReportRow};
pub use rules::CropRule;
pub use sampler::CellSelection;
