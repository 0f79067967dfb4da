//! Field source: reads polygon features from a vector file, or falls back to
//! the built-in demo set when the file is absent or unreadable.
pub mod demo;
pub mod geo_json;
pub mod kml;
pub mod shp;

use std::fmt;
use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use geo::{Geometry, MultiPolygon};
use log::{info, warn};

use crate::error::{CropfitError, Result};
use crate::field::{assign_ids, Field};

/// Attribute names consulted for a feature's id, in priority order.
pub(crate) const NAME_KEYS: [&str; 4] = ["Field_ID", "Name", "NAME", "name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    GeoJson,
    Kml,
    Kmz,
    /// Zipped ESRI shapefile bundle (.shp + .dbf, optionally .shx).
    ShapefileZip,
}

impl VectorFormat {
    /// Detect the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "geojson" | "json" => Some(Self::GeoJson),
            "kml" => Some(Self::Kml),
            "kmz" => Some(Self::Kmz),
            "zip" => Some(Self::ShapefileZip),
            _ => None,
        }
    }
}

/// Where the fields of a run came from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOrigin {
    File(PathBuf),
    Demo,
}

impl fmt::Display for FieldOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(p) => write!(f, "{}", p.display()),
            Self::Demo => f.write_str("built-in demo fields"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedFields {
    pub fields: Vec<Field>,
    pub origin: FieldOrigin,
}

/// Read every polygon feature of a vector file as a [`Field`].
///
/// Fails with [`CropfitError::UnreadableVectorFile`] when the file cannot be
/// parsed or contains no polygon features.
pub fn read_fields(path: &Path) -> Result<Vec<Field>> {
    let format = VectorFormat::from_path(path)
        .ok_or_else(|| CropfitError::vector(path, "unsupported file extension"))?;
    let raw = match format {
        VectorFormat::GeoJson => geo_json::read_geojson(path)?,
        VectorFormat::Kml => kml::read_kml(path)?,
        VectorFormat::Kmz => kml::read_kmz(path)?,
        VectorFormat::ShapefileZip => shp::read_shapefile_zip(path)?,
    };
    if raw.is_empty() {
        return Err(CropfitError::vector(path, "no polygon features found"));
    }
    Ok(assign_ids(raw))
}

/// Resolve the fields for a run.
///
/// No path: demo fields. Unreadable file: demo fields with a warning when
/// `demo_fallback` is set, otherwise the error is returned.
pub fn load_fields(path: Option<&Path>, demo_fallback: bool) -> Result<LoadedFields> {
    let Some(path) = path else {
        info!("No field file given; using built-in demo fields");
        return Ok(LoadedFields {
            fields: demo::demo_fields(),
            origin: FieldOrigin::Demo,
        });
    };

    match read_fields(path) {
        Ok(fields) => {
            info!("Read {} field(s) from {}", fields.len(), path.display());
            Ok(LoadedFields {
                fields,
                origin: FieldOrigin::File(path.to_path_buf()),
            })
        }
        Err(e @ CropfitError::UnreadableVectorFile { .. }) if demo_fallback => {
            warn!("{e}; falling back to built-in demo fields");
            Ok(LoadedFields {
                fields: demo::demo_fields(),
                origin: FieldOrigin::Demo,
            })
        }
        Err(e) => Err(e),
    }
}

/// Keep the areal part of a geometry. Points and lines yield None.
pub(crate) fn to_multipolygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let parts: Vec<_> = gc
                .into_iter()
                .filter_map(to_multipolygon)
                .flat_map(|mp| mp.0)
                .collect();
            (!parts.is_empty()).then(|| MultiPolygon::new(parts))
        }
        _ => None,
    }
}

/// Open a zip archive, mapping failures to an unreadable-vector error.
pub(crate) fn open_zip(path: &Path) -> Result<zip::ZipArchive<fs::File>> {
    let file = fs::File::open(path).map_err(|e| CropfitError::vector(path, e))?;
    zip::ZipArchive::new(file).map_err(|e| CropfitError::vector(path, format!("bad archive: {e}")))
}

/// Read the first archive entry whose lowercase name satisfies `pred`.
pub(crate) fn read_zip_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    pred: impl Fn(&str) -> bool,
) -> std::result::Result<Option<(String, Vec<u8>)>, String> {
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| e.to_string())?;
        let name = entry.name().to_string();
        if entry.is_dir() || !pred(&name.to_ascii_lowercase()) {
            continue;
        }
        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .map_err(|e| format!("read failed for {name}: {e}"))?;
        return Ok(Some((name, buf)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn format_detection_is_case_insensitive() {
        assert_eq!(VectorFormat::from_path(Path::new("a/b.KML")), Some(VectorFormat::Kml));
        assert_eq!(VectorFormat::from_path(Path::new("f.kmz")), Some(VectorFormat::Kmz));
        assert_eq!(VectorFormat::from_path(Path::new("f.zip")), Some(VectorFormat::ShapefileZip));
        assert_eq!(VectorFormat::from_path(Path::new("f.geojson")), Some(VectorFormat::GeoJson));
        assert_eq!(VectorFormat::from_path(Path::new("f.gpkg")), None);
        assert_eq!(VectorFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn no_path_uses_demo_fields() {
        let loaded = load_fields(None, false).unwrap();
        assert_eq!(loaded.origin, FieldOrigin::Demo);
        assert_eq!(loaded.fields, demo::demo_fields());
    }

    #[test]
    fn unreadable_file_falls_back_to_demo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        fs::File::create(&path).unwrap().write_all(b"not a zip").unwrap();

        let loaded = load_fields(Some(&path), true).unwrap();
        assert_eq!(loaded.origin, FieldOrigin::Demo);
        assert!(!loaded.fields.is_empty());
    }

    #[test]
    fn unreadable_file_without_fallback_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.kml");
        fs::write(&path, "<kml><Placemark>").unwrap();

        let err = load_fields(Some(&path), false).unwrap_err();
        assert!(matches!(err, CropfitError::UnreadableVectorFile { .. }));
    }

    #[test]
    fn unsupported_extension_is_unreadable() {
        let err = read_fields(Path::new("fields.gpkg")).unwrap_err();
        assert!(matches!(err, CropfitError::UnreadableVectorFile { .. }));
    }

    #[test]
    fn collections_keep_only_polygons() {
        use geo::{point, polygon, GeometryCollection};
        let gc = GeometryCollection::new_from(vec![
            Geometry::Point(point!(x: 1.0, y: 1.0)),
            Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0)]),
        ]);
        let mp = to_multipolygon(Geometry::GeometryCollection(gc)).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert!(to_multipolygon(Geometry::Point(point!(x: 0.0, y: 0.0))).is_none());
    }
}
