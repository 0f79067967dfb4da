//! GeoTIFF reader: decodes the first band of a single-image TIFF into a
//! [`Raster`], with the geotransform taken from the GeoTIFF model tags and the
//! no-data sentinel from the `GDAL_NODATA` tag.
//!
//! TIFF storage order is row 0 = north edge, which is also the [`Raster`]
//! order, so no row reversal happens here.
use std::fs;
use std::io::{self, Read, Seek};
use std::path::Path;

use log::{debug, warn};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::error::{CropfitError, Result};
use crate::raster::{GeoTransform, Raster};

/// Open a GeoTIFF from disk.
///
/// A path that does not exist is [`CropfitError::MissingRasterFile`]; any
/// decode problem is [`CropfitError::UnreadableRaster`].
pub fn read_geotiff(path: &Path) -> Result<Raster> {
    if !path.exists() {
        return Err(CropfitError::MissingRasterFile(path.to_path_buf()));
    }
    let file = fs::File::open(path).map_err(|e| CropfitError::raster(path, e))?;
    let raster = decode_geotiff(io::BufReader::new(file)).map_err(|e| CropfitError::raster(path, e))?;
    debug!(
        "Loaded {} ({}×{}, nodata={:?})",
        path.display(),
        raster.width,
        raster.height,
        raster.nodata
    );
    Ok(raster)
}

/// Decode a GeoTIFF from any seekable reader. The error is a plain message so
/// the caller can attach the path.
pub fn decode_geotiff<R: Read + Seek>(reader: R) -> std::result::Result<Raster, String> {
    let mut decoder = Decoder::new(reader).map_err(|e| format!("not a valid TIFF: {e}"))?;
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| format!("dimensions error: {e}"))?;
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Err("zero-sized image".to_string());
    }

    let transform = read_transform(&mut decoder)?;
    let nodata = read_nodata(&mut decoder);

    let img = decoder
        .read_image()
        .map_err(|e| format!("read_image error: {e}"))?;
    let nodata = nodata.and_then(|nd| cast_nodata(nd, &img));
    let samples = widen(img);

    let cells = width * height;
    if samples.len() < cells {
        return Err(format!("expected {cells} samples, decoded {}", samples.len()));
    }
    // Interleaved multi-sample images: keep band 1.
    let spp = samples.len() / cells;
    let data = if spp == 1 {
        samples
    } else {
        warn!("Image has {spp} samples per pixel; using band 1");
        samples.into_iter().step_by(spp).take(cells).collect()
    };

    Ok(Raster {
        data,
        width,
        height,
        transform,
        nodata,
    })
}

/// Bring the sentinel into the band's sample type so it compares equal to the
/// widened cells. A fractional sentinel on an integer band matches nothing.
fn cast_nodata(nodata: f64, img: &DecodingResult) -> Option<f64> {
    match img {
        _ if nodata.is_nan() => Some(nodata),
        DecodingResult::F64(_) => Some(nodata),
        DecodingResult::F32(_) => Some(nodata as f32 as f64),
        _ if nodata.fract() != 0.0 => {
            warn!("GDAL_NODATA {nodata} is not an integer on an integer band; ignoring");
            None
        }
        _ => Some(nodata),
    }
}

fn widen(img: DecodingResult) -> Vec<f64> {
    match img {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
    }
}

fn f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> std::result::Result<Option<Vec<f64>>, String> {
    match decoder.find_tag(tag) {
        Ok(Some(value)) => value
            .into_f64_vec()
            .map(Some)
            .map_err(|e| format!("malformed {tag:?}: {e}")),
        Ok(None) => Ok(None),
        Err(e) => Err(format!("cannot read {tag:?}: {e}")),
    }
}

/// Geotransform from `ModelTransformationTag`, else tiepoint + pixel scale.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> std::result::Result<GeoTransform, String> {
    if let Some(m) = f64_tag(decoder, Tag::ModelTransformationTag)? {
        if m.len() >= 8 {
            return Ok(GeoTransform {
                origin_x: m[3],
                origin_y: m[7],
                pixel_width: m[0],
                pixel_height: m[5],
                rotation_x: m[1],
                rotation_y: m[4],
            });
        }
        return Err(format!("ModelTransformationTag has {} values, expected 16", m.len()));
    }

    let scale = f64_tag(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = f64_tag(decoder, Tag::ModelTiepointTag)?;
    match (scale, tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            // Tiepoint (I, J, K, X, Y, Z) pins raster cell (I, J) to map (X, Y).
            let (i, j, x, y) = (t[0], t[1], t[3], t[4]);
            Ok(GeoTransform {
                origin_x: x - i * s[0],
                origin_y: y + j * s[1],
                pixel_width: s[0],
                pixel_height: -s[1],
                rotation_x: 0.0,
                rotation_y: 0.0,
            })
        }
        _ => Err("no georeferencing (missing ModelTiepoint/ModelPixelScale tags)".to_string()),
    }
}

/// `GDAL_NODATA` is stored as ASCII. Unparseable values are ignored with a warning.
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = match decoder.find_tag(Tag::GdalNodata) {
        Ok(Some(value)) => value.into_string().ok()?,
        _ => return None,
    };
    parse_nodata(&text).or_else(|| {
        warn!("Ignoring unparseable GDAL_NODATA value {text:?}");
        None
    })
}

fn parse_nodata(text: &str) -> Option<f64> {
    let t = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if t.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    t.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};

    fn encode_f32(width: u32, height: u32, data: &[f32], nodata: Option<&str>) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut enc = TiffEncoder::new(&mut buf).unwrap();
            let mut img = enc.new_image::<colortype::Gray32Float>(width, height).unwrap();
            img.encoder()
                .write_tag(Tag::ModelPixelScaleTag, &[0.5f64, 0.25, 0.0][..])
                .unwrap();
            img.encoder()
                .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 74.0, 19.5, 0.0][..])
                .unwrap();
            if let Some(nd) = nodata {
                img.encoder().write_tag(Tag::GdalNodata, nd).unwrap();
            }
            img.write_data(data).unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn decodes_values_transform_and_nodata() {
        let bytes = encode_f32(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, -9999.0], Some("-9999"));
        let r = decode_geotiff(Cursor::new(bytes)).unwrap();
        assert_eq!((r.width, r.height), (3, 2));
        assert_eq!(r.get(0, 2), 3.0);
        assert_eq!(r.get(1, 0), 4.0);
        assert_eq!(r.nodata, Some(-9999.0));
        assert!(r.is_nodata(r.get(1, 2)));
        assert_eq!(r.transform.origin_x, 74.0);
        assert_eq!(r.transform.origin_y, 19.5);
        assert_eq!(r.transform.pixel_width, 0.5);
        assert_eq!(r.transform.pixel_height, -0.25);
    }

    #[test]
    fn missing_nodata_tag_means_no_sentinel() {
        let bytes = encode_f32(1, 1, &[7.0], None);
        let r = decode_geotiff(Cursor::new(bytes)).unwrap();
        assert_eq!(r.nodata, None);
    }

    #[test]
    fn u8_classes_are_widened() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut enc = TiffEncoder::new(&mut buf).unwrap();
            let mut img = enc.new_image::<colortype::Gray8>(2, 1).unwrap();
            img.encoder()
                .write_tag(Tag::ModelPixelScaleTag, &[1.0f64, 1.0, 0.0][..])
                .unwrap();
            img.encoder()
                .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 0.0, 1.0, 0.0][..])
                .unwrap();
            img.write_data(&[3u8, 200]).unwrap();
        }
        let r = decode_geotiff(Cursor::new(buf.into_inner())).unwrap();
        assert_eq!(r.data, vec![3.0, 200.0]);
    }

    #[test]
    fn f32_sentinel_matches_after_narrowing() {
        let bytes = encode_f32(2, 1, &[f32::MIN, 5.0], Some("-3.4028235e+38"));
        let r = decode_geotiff(Cursor::new(bytes)).unwrap();
        assert!(r.is_nodata(r.get(0, 0)));
        assert!(!r.is_nodata(r.get(0, 1)));

        let bytes = encode_f32(2, 1, &[-9999.9, 1.5], Some("-9999.9"));
        let r = decode_geotiff(Cursor::new(bytes)).unwrap();
        assert_eq!(r.nodata, Some(-9999.9f32 as f64));
        assert!(r.is_nodata(r.get(0, 0)));
        assert!(!r.is_nodata(r.get(0, 1)));
    }

    #[test]
    fn fractional_sentinel_on_integer_band_is_dropped() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut enc = TiffEncoder::new(&mut buf).unwrap();
            let mut img = enc.new_image::<colortype::Gray8>(2, 1).unwrap();
            img.encoder()
                .write_tag(Tag::ModelPixelScaleTag, &[1.0f64, 1.0, 0.0][..])
                .unwrap();
            img.encoder()
                .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 0.0, 1.0, 0.0][..])
                .unwrap();
            img.encoder().write_tag(Tag::GdalNodata, "2.5").unwrap();
            img.write_data(&[2u8, 3]).unwrap();
        }
        let r = decode_geotiff(Cursor::new(buf.into_inner())).unwrap();
        assert_eq!(r.nodata, None);
    }

    #[test]
    fn ungeoreferenced_tiff_is_rejected() {
        let mut buf = Cursor::new(Vec::new());
        TiffEncoder::new(&mut buf)
            .unwrap()
            .write_image::<colortype::Gray8>(1, 1, &[0u8])
            .unwrap();
        let err = decode_geotiff(Cursor::new(buf.into_inner())).unwrap_err();
        assert!(err.contains("georeferencing"), "{err}");
    }

    #[test]
    fn garbage_bytes_are_not_a_tiff() {
        let err = decode_geotiff(Cursor::new(b"definitely not a tiff".to_vec())).unwrap_err();
        assert!(err.starts_with("not a valid TIFF"), "{err}");
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let err = read_geotiff(Path::new("does/not/exist.tif")).unwrap_err();
        assert!(matches!(err, CropfitError::MissingRasterFile(_)));
    }

    #[test]
    fn parse_nodata_variants() {
        assert_eq!(parse_nodata("-9999\0"), Some(-9999.0));
        assert_eq!(parse_nodata(" 0 "), Some(0.0));
        assert!(parse_nodata("nan").unwrap().is_nan());
        assert_eq!(
            parse_nodata("-3.4028234663852886e+38"),
            Some(f64::from(f32::MIN))
        );
        assert_eq!(parse_nodata("none"), None);
    }
}
