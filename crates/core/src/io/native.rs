//! Native GeoTIFF reading/writing (without the GDAL dependency)
//!
//! Uses the `tiff` crate. Projections are not decoded in this mode; the
//! geotransform is recovered from the ModelPixelScale/ModelTiepoint tags
//! and the nodata sentinel from the GDAL_NODATA ASCII tag. Enable the
//! `gdal` feature for full GeoTIFF support.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, RGB8};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

/// Options for writing GeoTIFF files.
///
/// The native writer ignores compression settings; the struct exists so the
/// API matches the GDAL-backed implementation.
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub compression: String,
    pub tile_size: usize,
}

/// Read one band of a GeoTIFF file into a Raster.
///
/// Only single-band files are supported in native mode; `band` values other
/// than 1 are rejected.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    if band.unwrap_or(1) != 1 {
        return Err(Error::UnsupportedDataType(
            "native reader supports band 1 only".to_string(),
        ));
    }

    let file = File::open(path.as_ref())?;
    let mut decoder =
        Decoder::new(file).map_err(|e| Error::Other(format!("TIFF decode error: {e}")))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("cannot read dimensions: {e}")))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("cannot read image data: {e}")))?;

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions { rows, cols });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    if let Ok(text) = decoder.get_tag_ascii_string(Tag::GdalNodata) {
        if let Ok(nd) = text.trim().trim_end_matches('\0').parse::<f64>() {
            raster.set_nodata(T::from_f64(nd));
        }
    }

    Ok(raster)
}

fn cast_buffer<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::Other("no pixel scale tag".into()))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::Other("no tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("cannot determine geotransform".into()))
}

macro_rules! write_geo_tags {
    ($image:expr, $transform:expr, $nodata:expr) => {{
        let gt = $transform;
        let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
        $image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), scale.as_slice())
            .map_err(|e| Error::Other(format!("cannot write scale tag: {e}")))?;

        let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        $image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_TIEPOINT), tiepoint.as_slice())
            .map_err(|e| Error::Other(format!("cannot write tiepoint tag: {e}")))?;

        // Minimal GeoKey directory: projected model, pixel-is-area.
        let geokeys: Vec<u16> = vec![
            1, 1, 0, 2, //
            1024, 0, 1, 1, //
            1025, 0, 1, 1, //
        ];
        $image
            .encoder()
            .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
            .map_err(|e| Error::Other(format!("cannot write geokey tag: {e}")))?;

        if let Some(nd) = $nodata {
            $image
                .encoder()
                .write_tag(Tag::Unknown(GDAL_NODATA), format!("{nd}").as_str())
                .map_err(|e| Error::Other(format!("cannot write nodata tag: {e}")))?;
        }
    }};
}

/// Write a single-band Raster to a GeoTIFF file.
///
/// Data is written as 32-bit float regardless of the element type.
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    _options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Other(format!("TIFF encoder error: {e}")))?;

    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("cannot create TIFF image: {e}")))?;

    write_geo_tags!(
        image,
        raster.transform(),
        raster.nodata().and_then(|nd| nd.to_f64())
    );

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("cannot write image data: {e}")))?;

    Ok(())
}

/// Write three u8 channel rasters as one interleaved RGB GeoTIFF.
pub fn write_rgb_geotiff<P>(
    red: &Raster<u8>,
    green: &Raster<u8>,
    blue: &Raster<u8>,
    path: P,
    _options: Option<GeoTiffOptions>,
) -> Result<()>
where
    P: AsRef<Path>,
{
    red.assert_same_grid(green)?;
    red.assert_same_grid(blue)?;

    let file = File::create(path.as_ref())?;
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Other(format!("TIFF encoder error: {e}")))?;

    let (rows, cols) = red.shape();
    let mut data = Vec::with_capacity(rows * cols * 3);
    for ((&r, &g), &b) in red
        .data()
        .iter()
        .zip(green.data().iter())
        .zip(blue.data().iter())
    {
        data.push(r);
        data.push(g);
        data.push(b);
    }

    let mut image = encoder
        .new_image::<RGB8>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("cannot create TIFF image: {e}")))?;

    write_geo_tags!(image, red.transform(), None::<f64>);

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("cannot write image data: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn write_read_roundtrip() {
        let mut raster: Raster<f32> = Raster::new(16, 8);
        raster.set_transform(GeoTransform::new(500_000.0, 4_200_000.0, 30.0, -30.0));
        raster.set_nodata(Some(0.0));
        for i in 0..16 {
            for j in 0..8 {
                raster.set(i, j, (i * 8 + j) as f32).unwrap();
            }
        }

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();

        let loaded: Raster<f32> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(loaded.shape(), raster.shape());
        assert_eq!(loaded.get(3, 4).unwrap(), raster.get(3, 4).unwrap());
        assert_eq!(loaded.nodata(), Some(0.0));

        let gt = loaded.transform();
        assert_relative_eq!(gt.origin_x, 500_000.0);
        assert_relative_eq!(gt.origin_y, 4_200_000.0);
        assert_relative_eq!(gt.pixel_width, 30.0);
        assert_relative_eq!(gt.pixel_height, -30.0);
    }

    #[test]
    fn roundtrip_casts_integer_elements() {
        let mut raster: Raster<u16> = Raster::new(4, 4);
        raster.set(2, 2, 9000).unwrap();

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();

        let loaded: Raster<f64> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(loaded.get(2, 2).unwrap(), 9000.0);
    }

    #[test]
    fn rgb_write_produces_file() {
        let r: Raster<u8> = Raster::filled(4, 4, 200);
        let g: Raster<u8> = Raster::filled(4, 4, 100);
        let b: Raster<u8> = Raster::filled(4, 4, 50);

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_rgb_geotiff(&r, &g, &b, tmp.path(), None).unwrap();
        assert!(tmp.path().metadata().unwrap().len() > 0);
    }
}
