//! Report rows and their CSV / JSON / terminal renderings.
//!
//! Results carry full-precision averages; rounding to two decimals happens
//! only when a [`ReportRow`] is built for export.
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

pub const CSV_HEADER: [&str; 5] = [
    "Field_ID",
    "Average_Salinity",
    "Average_Slope",
    "Average_Suitability",
    "Recommended_Crops",
];

/// Written in place of an average that could not be computed.
pub const DEFAULT_NODATA_MARKER: &str = "NoData";

/// Separator between recommended crops in one cell.
pub const CROP_SEPARATOR: &str = ", ";

/// Outcome of evaluating one field. Averages are unrounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResult {
    pub field_id: String,
    pub avg_salinity: Option<f64>,
    pub avg_slope: Option<f64>,
    pub avg_suitability: Option<f64>,
    pub recommended: Vec<String>,
}

/// One exported line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Field_ID")]
    pub field_id: String,
    #[serde(rename = "Average_Salinity")]
    pub average_salinity: Option<f64>,
    #[serde(rename = "Average_Slope")]
    pub average_slope: Option<f64>,
    #[serde(rename = "Average_Suitability")]
    pub average_suitability: Option<f64>,
    #[serde(rename = "Recommended_Crops")]
    pub recommended_crops: String,
}

/// Round half away from zero to two decimals. Never yields `-0.0`.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0 + 0.0
}

pub fn build_row(
    field_id: &str,
    avg_salinity: Option<f64>,
    avg_slope: Option<f64>,
    avg_suitability: Option<f64>,
    recommended: &[String],
) -> ReportRow {
    ReportRow {
        field_id: field_id.to_string(),
        average_salinity: avg_salinity.map(round2),
        average_slope: avg_slope.map(round2),
        average_suitability: avg_suitability.map(round2),
        recommended_crops: recommended.join(CROP_SEPARATOR),
    }
}

impl From<&FieldResult> for ReportRow {
    fn from(r: &FieldResult) -> Self {
        build_row(
            &r.field_id,
            r.avg_salinity,
            r.avg_slope,
            r.avg_suitability,
            &r.recommended,
        )
    }
}

/// Report rows in field order.
pub fn build_report(results: &[FieldResult]) -> Vec<ReportRow> {
    results.iter().map(ReportRow::from).collect()
}

fn format_average(v: Option<f64>, nodata_marker: &str) -> String {
    match v {
        Some(x) => format!("{x:.2}"),
        None => nodata_marker.to_string(),
    }
}

impl ReportRow {
    fn cells(&self, nodata_marker: &str) -> [String; 5] {
        [
            self.field_id.clone(),
            format_average(self.average_salinity, nodata_marker),
            format_average(self.average_slope, nodata_marker),
            format_average(self.average_suitability, nodata_marker),
            self.recommended_crops.clone(),
        ]
    }
}

// ── CSV ──────────────────────────────────────────────────────────────────────

pub fn write_csv<W: Write>(writer: W, rows: &[ReportRow], nodata_marker: &str) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for row in rows {
        wtr.write_record(row.cells(nodata_marker))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv_string(rows: &[ReportRow], nodata_marker: &str) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, rows, nodata_marker)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write the CSV report, creating the parent directory if needed.
pub fn write_csv_file(path: &Path, rows: &[ReportRow], nodata_marker: &str) -> Result<()> {
    create_parent(path)?;
    write_csv(fs::File::create(path)?, rows, nodata_marker)
}

// ── JSON ─────────────────────────────────────────────────────────────────────

/// Pretty JSON array of rows. Missing averages become `null`.
pub fn write_json<W: Write>(writer: W, rows: &[ReportRow]) -> Result<()> {
    serde_json::to_writer_pretty(writer, rows)?;
    Ok(())
}

pub fn write_json_file(path: &Path, rows: &[ReportRow]) -> Result<()> {
    create_parent(path)?;
    let mut file = fs::File::create(path)?;
    write_json(&mut file, rows)?;
    writeln!(file)?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

// ── Terminal table ───────────────────────────────────────────────────────────

/// Fixed-width text table: ids and crops left-aligned, averages right-aligned.
pub fn render_table(rows: &[ReportRow], nodata_marker: &str) -> String {
    let body: Vec<[String; 5]> = rows.iter().map(|r| r.cells(nodata_marker)).collect();

    let mut widths = CSV_HEADER.map(str::len);
    for cells in &body {
        for (w, cell) in widths.iter_mut().zip(cells) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 5]| {
        let mut s = String::new();
        for (i, (cell, w)) in cells.iter().zip(widths).enumerate() {
            if i > 0 {
                s.push_str("  ");
            }
            let pad = w.saturating_sub(cell.chars().count());
            match i {
                1..=3 => {
                    s.push_str(&" ".repeat(pad));
                    s.push_str(cell);
                }
                4 => s.push_str(cell),
                _ => {
                    s.push_str(cell);
                    s.push_str(&" ".repeat(pad));
                }
            }
        }
        s.push('\n');
        s
    };

    let mut out = line(CSV_HEADER);
    let rule_len = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);
    out.push_str(&"-".repeat(rule_len));
    out.push('\n');
    for cells in &body {
        out.push_str(&line(cells.each_ref().map(String::as_str)));
    }
    out
}
