//! Zonal mean of a raster under a field polygon.
//!
//! Only the cells inside the polygon's bounding window are visited. A cell is
//! selected by its center (default, the rasterio/GDAL rule) or, with
//! [`CellSelection::AllTouched`], by any overlap of its footprint. No-data and
//! NaN cells are skipped. Accumulation is in f64 and nothing is rounded here.
use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use serde::{Deserialize, Serialize};

use crate::raster::Raster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellSelection {
    /// Cell center lies inside the polygon or on its boundary.
    #[default]
    Center,
    /// Cell footprint intersects the polygon at all.
    AllTouched,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalStats {
    /// Mean of the valid selected cells; None when there are none.
    pub mean: Option<f64>,
    /// Selected cells, no-data included.
    pub cells: usize,
    pub nodata_cells: usize,
}

impl ZonalStats {
    const EMPTY: Self = Self {
        mean: None,
        cells: 0,
        nodata_cells: 0,
    };
}

pub fn zonal_stats(raster: &Raster, polygon: &MultiPolygon<f64>, selection: CellSelection) -> ZonalStats {
    let Some(bbox) = polygon.bounding_rect() else {
        return ZonalStats::EMPTY;
    };
    let Some(window) = raster.window_for(bbox) else {
        return ZonalStats::EMPTY;
    };

    let mut sum = 0.0f64;
    let mut valid = 0usize;
    let mut nodata = 0usize;

    for row in window.row_start..window.row_end {
        for col in window.col_start..window.col_end {
            let selected = match selection {
                CellSelection::Center => {
                    let (x, y) = raster.cell_center(row, col);
                    polygon.intersects(&Point::new(x, y))
                }
                CellSelection::AllTouched => polygon.intersects(&raster.cell_footprint(row, col)),
            };
            if !selected {
                continue;
            }
            let v = raster.get(row, col);
            if raster.is_nodata(v) {
                nodata += 1;
            } else {
                sum += v;
                valid += 1;
            }
        }
    }

    ZonalStats {
        mean: (valid > 0).then(|| sum / valid as f64),
        cells: valid + nodata,
        nodata_cells: nodata,
    }
}

/// Mean raster value under `polygon`, or None when no valid cell is covered
/// (no overlap with the raster, or only no-data cells).
pub fn sample(raster: &Raster, polygon: &MultiPolygon<f64>, selection: CellSelection) -> Option<f64> {
    zonal_stats(raster, polygon, selection).mean
}
