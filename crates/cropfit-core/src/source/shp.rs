//! Zipped ESRI shapefile reader. The archive must contain a `.shp` and a
//! matching `.dbf`; the `.shx` index is not needed for a sequential read.
use std::io::Cursor;
use std::path::Path;

use geo::{LineString, MultiPolygon, Polygon};
use log::warn;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{PolygonRing, Shape};

use super::{open_zip, read_zip_entry, NAME_KEYS};
use crate::error::{CropfitError, Result};
use crate::field::RawFeature;

pub fn read_shapefile_zip(path: &Path) -> Result<Vec<RawFeature>> {
    let mut archive = open_zip(path)?;

    let (shp_name, shp_bytes) = read_zip_entry(&mut archive, |n| n.ends_with(".shp"))
        .map_err(|e| CropfitError::vector(path, e))?
        .ok_or_else(|| CropfitError::vector(path, "archive contains no .shp file"))?;

    let stem = shp_name[..shp_name.len() - 4].to_ascii_lowercase();
    let dbf_name = format!("{stem}.dbf");
    let (_, dbf_bytes) = read_zip_entry(&mut archive, |n| n == dbf_name)
        .map_err(|e| CropfitError::vector(path, e))?
        .ok_or_else(|| CropfitError::vector(path, format!("missing {dbf_name} next to {shp_name}")))?;

    parse_shapefile(shp_bytes, dbf_bytes).map_err(|e| CropfitError::vector(path, e))
}

pub fn parse_shapefile(shp: Vec<u8>, dbf: Vec<u8>) -> std::result::Result<Vec<RawFeature>, String> {
    let shape_reader = shapefile::ShapeReader::new(Cursor::new(shp)).map_err(|e| e.to_string())?;
    let dbf_reader = shapefile::dbase::Reader::new(Cursor::new(dbf)).map_err(|e| e.to_string())?;
    let mut reader = shapefile::Reader::new(shape_reader, dbf_reader);

    let mut out = Vec::new();
    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item.map_err(|e| format!("record {index}: {e}"))?;
        let geometry = match shape {
            Shape::Polygon(p) => rings_to_multipolygon(p.rings(), |pt| (pt.x, pt.y)),
            Shape::PolygonM(p) => rings_to_multipolygon(p.rings(), |pt| (pt.x, pt.y)),
            Shape::PolygonZ(p) => rings_to_multipolygon(p.rings(), |pt| (pt.x, pt.y)),
            other => {
                warn!("Record {index} is a {:?} shape, not a polygon; skipping", other.shapetype());
                continue;
            }
        };
        match geometry {
            Some(mp) => out.push(RawFeature {
                index,
                name: record_name(&record),
                geometry: mp,
            }),
            None => warn!("Record {index} has no outer ring; skipping"),
        }
    }
    Ok(out)
}

/// Shapefile rings arrive flat; each inner ring belongs to the outer ring
/// preceding it.
fn rings_to_multipolygon<P>(
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> (f64, f64),
) -> Option<MultiPolygon<f64>> {
    let to_line = |pts: &[P]| LineString::from(pts.iter().map(&xy).collect::<Vec<_>>());

    let mut parts: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(pts) => parts.push((to_line(pts.as_slice()), Vec::new())),
            PolygonRing::Inner(pts) => match parts.last_mut() {
                Some((_, holes)) => holes.push(to_line(pts.as_slice())),
                None => warn!("Inner ring before any outer ring; ignoring"),
            },
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(MultiPolygon::new(
        parts
            .into_iter()
            .map(|(outer, holes)| Polygon::new(outer, holes))
            .collect(),
    ))
}

fn record_name(record: &Record) -> Option<String> {
    NAME_KEYS.iter().find_map(|key| match record.get(key)? {
        FieldValue::Character(Some(s)) => Some(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => Some(n.to_string()),
        FieldValue::Integer(n) => Some(n.to_string()),
        _ => None,
    })
}
