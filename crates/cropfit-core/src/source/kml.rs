//! KML / KMZ reader. Each `<Placemark>` holding one or more `<Polygon>`s
//! becomes one feature. The id comes from a `Field_ID` extended-data entry,
//! then the placemark `<name>`.
use std::fs;
use std::path::Path;

use geo::{LineString, MultiPolygon, Polygon};
use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{open_zip, read_zip_entry};
use crate::error::{CropfitError, Result};
use crate::field::RawFeature;

pub fn read_kml(path: &Path) -> Result<Vec<RawFeature>> {
    let text = fs::read_to_string(path).map_err(|e| CropfitError::vector(path, e))?;
    parse_kml(&text).map_err(|e| CropfitError::vector(path, e))
}

/// KMZ is a zip holding a KML document, conventionally `doc.kml`.
pub fn read_kmz(path: &Path) -> Result<Vec<RawFeature>> {
    let mut archive = open_zip(path)?;
    let entry = match read_zip_entry(&mut archive, |n| n == "doc.kml" || n.ends_with("/doc.kml")) {
        Ok(Some(entry)) => Some(entry),
        Ok(None) => read_zip_entry(&mut archive, |n| n.ends_with(".kml"))
            .map_err(|e| CropfitError::vector(path, e))?,
        Err(e) => return Err(CropfitError::vector(path, e)),
    };
    let Some((name, bytes)) = entry else {
        return Err(CropfitError::vector(path, "archive contains no .kml document"));
    };
    let text = String::from_utf8(bytes)
        .map_err(|e| CropfitError::vector(path, format!("{name} is not UTF-8: {e}")))?;
    parse_kml(&text).map_err(|e| CropfitError::vector(path, e))
}

#[derive(Default)]
struct PlacemarkState {
    name: Option<String>,
    field_id: Option<String>,
    polygons: Vec<Polygon<f64>>,
    outer: Option<LineString<f64>>,
    inners: Vec<LineString<f64>>,
}

pub fn parse_kml(text: &str) -> std::result::Result<Vec<RawFeature>, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text_buf = String::new();
    let mut data_name: Option<String> = None;
    let mut placemark: Option<PlacemarkState> = None;
    let mut placemark_index = 0usize;
    let mut out = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                let tag = local_name(&e);
                match tag.as_str() {
                    "Placemark" => placemark = Some(PlacemarkState::default()),
                    "Polygon" => {
                        if let Some(pm) = placemark.as_mut() {
                            pm.outer = None;
                            pm.inners.clear();
                        }
                    }
                    "Data" | "SimpleData" => data_name = attribute(&e, "name")?,
                    _ => {}
                }
                stack.push(tag);
                text_buf.clear();
            }
            Event::Text(t) => {
                let s = t.unescape().map_err(|e| e.to_string())?;
                text_buf.push_str(&s);
            }
            Event::CData(c) => text_buf.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => {
                let Some(tag) = stack.pop() else {
                    return Err("unbalanced closing tag".to_string());
                };
                let parent = stack.last().map(String::as_str);
                if let Some(pm) = placemark.as_mut() {
                    match (tag.as_str(), parent) {
                        ("name", Some("Placemark")) => pm.name = Some(text_buf.trim().to_string()),
                        ("coordinates", _) => {
                            if stack.iter().any(|t| t == "innerBoundaryIs") {
                                pm.inners.push(parse_coordinates(&text_buf)?);
                            } else if stack.iter().any(|t| t == "outerBoundaryIs") {
                                pm.outer = Some(parse_coordinates(&text_buf)?);
                            }
                        }
                        ("SimpleData", _) | ("value", Some("Data")) => {
                            if data_name.as_deref() == Some("Field_ID") {
                                pm.field_id = Some(text_buf.trim().to_string());
                            }
                        }
                        ("Polygon", _) => match pm.outer.take() {
                            Some(outer) => {
                                let inners = std::mem::take(&mut pm.inners);
                                pm.polygons.push(Polygon::new(outer, inners));
                            }
                            None => warn!("Polygon without outer boundary in placemark {placemark_index}"),
                        },
                        _ => {}
                    }
                }
                if tag == "Placemark" {
                    if let Some(pm) = placemark.take() {
                        let name = pm.field_id.or(pm.name).filter(|n| !n.is_empty());
                        if pm.polygons.is_empty() {
                            warn!("Placemark {placemark_index} has no polygon; skipping");
                        } else {
                            out.push(RawFeature {
                                index: placemark_index,
                                name,
                                geometry: MultiPolygon::new(pm.polygons),
                            });
                        }
                    }
                    placemark_index += 1;
                }
                text_buf.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format!("unexpected end of document inside <{}>", stack.join("/")));
    }
    Ok(out)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> std::result::Result<Option<String>, String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        if attr.key.local_name().as_ref() == key.as_bytes() {
            let value = attr.unescape_value().map_err(|err| err.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// KML coordinates: whitespace-separated `lon,lat[,alt]` tuples.
fn parse_coordinates(text: &str) -> std::result::Result<LineString<f64>, String> {
    let mut points = Vec::new();
    for tuple in text.split_whitespace() {
        let mut parts = tuple.split(',');
        let (Some(lon), Some(lat)) = (parts.next(), parts.next()) else {
            return Err(format!("malformed coordinate tuple {tuple:?}"));
        };
        let lon: f64 = lon
            .parse()
            .map_err(|_| format!("bad longitude in {tuple:?}"))?;
        let lat: f64 = lat
            .parse()
            .map_err(|_| format!("bad latitude in {tuple:?}"))?;
        points.push((lon, lat));
    }
    if points.len() < 3 {
        return Err(format!("ring has {} coordinate(s), need at least 3", points.len()));
    }
    Ok(LineString::from(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>Rahuri fields</name>
    <Placemark>
      <name>Plot A</name>
      <Polygon>
        <outerBoundaryIs><LinearRing><coordinates>
          74.60,19.38,0 74.61,19.38,0 74.61,19.39,0 74.60,19.39,0 74.60,19.38,0
        </coordinates></LinearRing></outerBoundaryIs>
        <innerBoundaryIs><LinearRing><coordinates>
          74.602,19.382 74.604,19.382 74.604,19.384 74.602,19.382
        </coordinates></LinearRing></innerBoundaryIs>
      </Polygon>
    </Placemark>
    <Placemark>
      <name>Well</name>
      <Point><coordinates>74.62,19.40,0</coordinates></Point>
    </Placemark>
    <Placemark>
      <name>display name</name>
      <ExtendedData><SchemaData schemaUrl="#s">
        <SimpleData name="Field_ID">F-42</SimpleData>
      </SchemaData></ExtendedData>
      <MultiGeometry>
        <Polygon><outerBoundaryIs><LinearRing><coordinates>0,0 1,0 1,1 0,0</coordinates></LinearRing></outerBoundaryIs></Polygon>
        <Polygon><outerBoundaryIs><LinearRing><coordinates>2,2 3,2 3,3 2,2</coordinates></LinearRing></outerBoundaryIs></Polygon>
      </MultiGeometry>
    </Placemark>
  </Document>
</kml>"##;

    #[test]
    fn reads_placemark_polygons() {
        let features = parse_kml(DOC).unwrap();
        assert_eq!(features.len(), 2);

        let a = &features[0];
        assert_eq!(a.name.as_deref(), Some("Plot A"));
        assert_eq!(a.index, 0);
        assert_eq!(a.geometry.0.len(), 1);
        assert_eq!(a.geometry.0[0].interiors().len(), 1);
        assert_eq!(a.geometry.0[0].exterior().0.len(), 5);

        let b = &features[1];
        assert_eq!(b.name.as_deref(), Some("F-42"));
        assert_eq!(b.index, 2);
        assert_eq!(b.geometry.0.len(), 2);
    }

    #[test]
    fn bad_coordinates_are_an_error() {
        let doc = "<kml><Placemark><Polygon><outerBoundaryIs><LinearRing>\
                   <coordinates>a,b 1,1 2,2</coordinates>\
                   </LinearRing></outerBoundaryIs></Polygon></Placemark></kml>";
        assert!(parse_kml(doc).is_err());
    }

    #[test]
    fn truncated_document_is_an_error() {
        assert!(parse_kml("<kml><Placemark><name>x</name>").is_err());
    }

    #[test]
    fn kmz_reads_embedded_doc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.kmz");
        {
            let file = fs::File::create(&path).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            zip.start_file("doc.kml", options).unwrap();
            zip.write_all(DOC.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        let features = read_kmz(&path).unwrap();
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn kmz_without_kml_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.kmz");
        {
            let file = fs::File::create(&path).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("readme.txt", options).unwrap();
            zip.write_all(b"nothing here").unwrap();
            zip.finish().unwrap();
        }
        let err = read_kmz(&path).unwrap_err();
        assert!(matches!(err, CropfitError::UnreadableVectorFile { .. }));
    }
}
