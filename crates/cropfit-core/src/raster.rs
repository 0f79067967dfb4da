use geo::{coord, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// Affine transform from (col, row) grid space to map coordinates, in the
/// GDAL geotransform layout. `pixel_height` is negative for north-up grids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X of the upper-left corner of the upper-left cell.
    pub origin_x: f64,
    /// Y of the upper-left corner of the upper-left cell.
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub rotation_x: f64,
    pub rotation_y: f64,
}

impl GeoTransform {
    /// Axis-aligned, north-up transform with square or rectangular cells.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height: -pixel_height.abs(),
            rotation_x: 0.0,
            rotation_y: 0.0,
        }
    }

    #[inline]
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.rotation_x;
        let y = self.origin_y + col * self.rotation_y + row * self.pixel_height;
        (x, y)
    }

    /// Inverse of [`pixel_to_geo`](Self::pixel_to_geo). Returns None for a
    /// degenerate (non-invertible) transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det.abs() < 1e-18 {
            return None;
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (self.pixel_height * dx - self.rotation_x * dy) / det;
        let row = (self.pixel_width * dy - self.rotation_y * dx) / det;
        Some((col, row))
    }
}

/// Half-open cell window `[row_start, row_end) × [col_start, col_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWindow {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl CellWindow {
    pub fn is_empty(&self) -> bool {
        self.row_start >= self.row_end || self.col_start >= self.col_end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.row_end - self.row_start) * (self.col_end - self.col_start)
        }
    }
}

/// A single-band raster held in memory, row-major with row 0 at the top
/// (the TIFF storage order). Values are widened to f64 on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    pub data: Vec<f64>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    /// Sentinel marking "no measurement". NaN cells are no-data regardless.
    pub nodata: Option<f64>,
}

impl Raster {
    /// Create a raster filled with the given value.
    pub fn new(width: usize, height: usize, transform: GeoTransform, fill: f64) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            transform,
            nodata: None,
        }
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f64) {
        self.data[row * self.width + col] = val;
    }

    #[inline]
    pub fn is_nodata(&self, v: f64) -> bool {
        v.is_nan() || self.nodata.is_some_and(|nd| v == nd)
    }

    /// Map coordinates of the cell center.
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// The cell's footprint as a polygon (handles rotated transforms).
    pub fn cell_footprint(&self, row: usize, col: usize) -> Polygon<f64> {
        let (c, r) = (col as f64, row as f64);
        let corners = [(c, r), (c + 1.0, r), (c + 1.0, r + 1.0), (c, r + 1.0)];
        let ring: Vec<(f64, f64)> = corners
            .iter()
            .map(|&(cc, rr)| self.transform.pixel_to_geo(cc, rr))
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Map-space bounding rectangle of the whole grid.
    pub fn extent(&self) -> Rect<f64> {
        let (w, h) = (self.width as f64, self.height as f64);
        let pts = [
            self.transform.pixel_to_geo(0.0, 0.0),
            self.transform.pixel_to_geo(w, 0.0),
            self.transform.pixel_to_geo(0.0, h),
            self.transform.pixel_to_geo(w, h),
        ];
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in pts {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y })
    }

    /// Cells whose footprint may overlap `bbox`, clamped to the grid.
    /// Returns None when the box lies entirely outside the raster.
    pub fn window_for(&self, bbox: Rect<f64>) -> Option<CellWindow> {
        let (min, max) = (bbox.min(), bbox.max());
        let corners = [(min.x, min.y), (max.x, min.y), (min.x, max.y), (max.x, max.y)];

        let (mut min_c, mut min_r) = (f64::INFINITY, f64::INFINITY);
        let (mut max_c, mut max_r) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            let (c, r) = self.transform.geo_to_pixel(x, y)?;
            min_c = min_c.min(c);
            min_r = min_r.min(r);
            max_c = max_c.max(c);
            max_r = max_r.max(r);
        }

        let clamp = |v: f64, hi: usize| -> usize { v.max(0.0).min(hi as f64) as usize };
        let window = CellWindow {
            row_start: clamp(min_r.floor(), self.height),
            row_end: clamp(max_r.ceil(), self.height),
            col_start: clamp(min_c.floor(), self.width),
            col_end: clamp(max_c.ceil(), self.width),
        };
        (!window.is_empty()).then_some(window)
    }
}
