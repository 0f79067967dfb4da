/// Crop recommendation tool: averages salinity, slope and suitability rasters
/// under each field polygon and lists the crops whose tolerances fit.
///
/// Writes one row per field to CSV (or JSON) and prints a summary table.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::info;

use cropfit_core::report::{self, render_table};
use cropfit_core::{build_report, execute, CellSelection, OutputFormat, RunConfig};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "recommend",
    about = "Recommend crops per field from salinity, slope and suitability rasters"
)]
struct Args {
    /// Field polygons (.geojson, .kml, .kmz, or zipped shapefile). Omit to run the demo fields
    #[arg(long)]
    fields: Option<PathBuf>,

    /// Crop rule table (CSV with Crop, EC_max, Slope_max)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Salinity raster (GeoTIFF)
    #[arg(long)]
    salinity: Option<PathBuf>,

    /// Slope raster (GeoTIFF)
    #[arg(long)]
    slope: Option<PathBuf>,

    /// Suitability raster (GeoTIFF)
    #[arg(long)]
    suitability: Option<PathBuf>,

    /// Report path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Include every cell the polygon touches, not just cells whose center it covers
    #[arg(long)]
    all_touched: bool,

    /// Fail instead of using the demo fields when the field file is unreadable
    #[arg(long)]
    no_demo_fallback: bool,

    /// Text written for averages with no data
    #[arg(long)]
    nodata_marker: Option<String>,

    /// JSON run config; flags given on the command line take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only log warnings and skip the summary table
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn resolve(&self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_path(path)
                .with_context(|| format!("Cannot load run config {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(p) = &self.fields {
            cfg.fields = Some(p.clone());
        }
        if let Some(p) = &self.rules {
            cfg.rules = p.clone();
        }
        if let Some(p) = &self.salinity {
            cfg.rasters.salinity = p.clone();
        }
        if let Some(p) = &self.slope {
            cfg.rasters.slope = p.clone();
        }
        if let Some(p) = &self.suitability {
            cfg.rasters.suitability = p.clone();
        }
        if let Some(f) = self.format {
            cfg.format = f.into();
        }
        match &self.output {
            Some(p) => cfg.output = p.clone(),
            None if cfg.format == OutputFormat::Json
                && cfg.output.extension().is_some_and(|e| e == "csv") =>
            {
                cfg.output.set_extension("json");
            }
            None => {}
        }
        if self.all_touched {
            cfg.cell_selection = CellSelection::AllTouched;
        }
        if self.no_demo_fallback {
            cfg.demo_fallback = false;
        }
        if let Some(m) = &self.nodata_marker {
            cfg.nodata_marker = m.clone();
        }
        Ok(cfg)
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let cfg = args.resolve()?;
    let output = execute(&cfg).context("Crop recommendation run failed")?;
    let rows = build_report(&output.results);

    let written = match cfg.format {
        OutputFormat::Csv => report::write_csv_file(&cfg.output, &rows, &cfg.nodata_marker),
        OutputFormat::Json => report::write_json_file(&cfg.output, &rows),
    };
    written.with_context(|| format!("Cannot write report {}", cfg.output.display()))?;
    info!("Wrote {} row(s) to {}", rows.len(), cfg.output.display());

    if !args.quiet {
        println!("Fields: {}", output.origin);
        print!("{}", render_table(&rows, &cfg.nodata_marker));
    }
    Ok(())
}
