use std::fs;
use std::path::Path;

use geojson::{Feature, GeoJson};
use log::warn;
use serde_json::Value;

use super::{to_multipolygon, NAME_KEYS};
use crate::error::{CropfitError, Result};
use crate::field::RawFeature;

/// Read polygon features from a GeoJSON FeatureCollection, Feature or bare geometry.
pub fn read_geojson(path: &Path) -> Result<Vec<RawFeature>> {
    let text = fs::read_to_string(path).map_err(|e| CropfitError::vector(path, e))?;
    parse_geojson(&text).map_err(|e| CropfitError::vector(path, e))
}

pub fn parse_geojson(text: &str) -> std::result::Result<Vec<RawFeature>, String> {
    let doc: GeoJson = text.parse().map_err(|e: geojson::Error| e.to_string())?;
    let entries: Vec<(Option<String>, Option<geojson::Geometry>)> = match doc {
        GeoJson::FeatureCollection(fc) => fc
            .features
            .into_iter()
            .map(|f| (feature_name(&f), f.geometry))
            .collect(),
        GeoJson::Feature(f) => vec![(feature_name(&f), f.geometry)],
        GeoJson::Geometry(g) => vec![(None, Some(g))],
    };

    let mut out = Vec::new();
    for (index, (name, geometry)) in entries.into_iter().enumerate() {
        let Some(geometry) = geometry else {
            warn!("Feature {index} has no geometry; skipping");
            continue;
        };
        let geometry: geo::Geometry<f64> = geometry
            .try_into()
            .map_err(|e: geojson::Error| format!("feature {index}: {e}"))?;
        match to_multipolygon(geometry) {
            Some(mp) => out.push(RawFeature {
                index,
                name,
                geometry: mp,
            }),
            None => warn!("Feature {index} is not a polygon; skipping"),
        }
    }
    Ok(out)
}

fn feature_name(feature: &Feature) -> Option<String> {
    NAME_KEYS.iter().find_map(|key| match feature.property(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "Name": "North plot" },
                "geometry": { "type": "Polygon", "coordinates": [[[74.0,19.0],[74.1,19.0],[74.1,19.1],[74.0,19.0]]] }
            },
            {
                "type": "Feature",
                "properties": { "Field_ID": 17, "Name": "ignored" },
                "geometry": { "type": "MultiPolygon", "coordinates": [
                    [[[0,0],[1,0],[1,1],[0,0]]],
                    [[[2,2],[3,2],[3,3],[2,2]]]
                ] }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Point", "coordinates": [1, 1] }
            },
            {
                "type": "Feature",
                "properties": null,
                "geometry": { "type": "Polygon", "coordinates": [[[5,5],[6,5],[6,6],[5,5]]] }
            }
        ]
    }"#;

    #[test]
    fn reads_polygons_and_names() {
        let features = parse_geojson(COLLECTION).unwrap();
        assert_eq!(features.len(), 3);

        assert_eq!(features[0].name.as_deref(), Some("North plot"));
        assert_eq!(features[0].index, 0);

        assert_eq!(features[1].name.as_deref(), Some("17"));
        assert_eq!(features[1].geometry.0.len(), 2);

        // The point feature at index 2 is skipped; indices stay file positions.
        assert_eq!(features[2].index, 3);
        assert_eq!(features[2].name, None);
    }

    #[test]
    fn bare_geometry_is_one_unnamed_feature() {
        let text = r#"{ "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] }"#;
        let features = parse_geojson(text).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].name, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_geojson("{ not json").is_err());
    }
}
