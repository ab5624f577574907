//! GeoTIFF reading and writing using GDAL

use crate::crs::Crs;
use crate::error::Result;
use crate::raster::{GeoTransform, Raster, RasterElement};
use gdal::raster::{Buffer, GdalType, RasterCreationOption};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use std::path::Path;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Compression type: "DEFLATE", "LZW", "NONE"
    pub compression: String,
    /// Tile size for tiled TIFFs (0 for strips)
    pub tile_size: usize,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "DEFLATE".to_string(),
            tile_size: 256,
        }
    }
}

/// Read one band of a GeoTIFF file into a Raster.
///
/// `band` is 1-indexed and defaults to 1. The raster's transform, CRS and
/// nodata sentinel are populated from the dataset where present.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let dataset = Dataset::open(path.as_ref())?;
    let rasterband = dataset.rasterband(band.unwrap_or(1))?;

    let (cols, rows) = dataset.raster_size();
    let buffer = rasterband.read_as::<T>((0, 0), (cols, rows), (cols, rows), None)?;

    let mut raster = Raster::from_vec(buffer.data, rows, cols)?;

    if let Ok(gt) = dataset.geo_transform() {
        raster.set_transform(GeoTransform::from_gdal(gt));
    }

    if let Ok(srs) = dataset.spatial_ref() {
        let crs = match srs.auth_code() {
            Ok(code) => Crs::from_epsg(code as u32),
            Err(_) => match srs.to_wkt() {
                Ok(wkt) => Crs::from_wkt(wkt),
                Err(_) => Crs::default(),
            },
        };
        raster.set_crs(Some(crs));
    }

    if let Some(nodata) = rasterband.no_data_value() {
        if let Some(nd) = num_traits::cast(nodata) {
            raster.set_nodata(Some(nd));
        }
    }

    Ok(raster)
}

fn set_dataset_crs(dataset: &mut Dataset, crs: Option<&Crs>) -> Result<()> {
    if let Some(crs) = crs {
        if let Some(epsg) = crs.epsg() {
            let srs = SpatialRef::from_epsg(epsg)?;
            dataset.set_spatial_ref(&srs)?;
        } else if let Some(wkt) = crs.wkt() {
            let srs = SpatialRef::from_wkt(wkt)?;
            dataset.set_spatial_ref(&srs)?;
        }
    }
    Ok(())
}

fn create_dataset<T: GdalType>(
    path: &Path,
    cols: usize,
    rows: usize,
    bands: usize,
    opts: &GeoTiffOptions,
) -> Result<Dataset> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let tile = opts.tile_size.to_string();

    let mut options = vec![RasterCreationOption {
        key: "COMPRESS",
        value: &opts.compression,
    }];
    if opts.tile_size > 0 {
        options.push(RasterCreationOption {
            key: "TILED",
            value: "YES",
        });
        options.push(RasterCreationOption {
            key: "BLOCKXSIZE",
            value: &tile,
        });
        options.push(RasterCreationOption {
            key: "BLOCKYSIZE",
            value: &tile,
        });
    }

    Ok(driver.create_with_band_type_with_options::<T, _>(
        path,
        cols as isize,
        rows as isize,
        bands as isize,
        &options,
    )?)
}

/// Write a single-band Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let opts = options.unwrap_or_default();
    let (rows, cols) = raster.shape();
    let mut dataset = create_dataset::<T>(path.as_ref(), cols, rows, 1, &opts)?;

    dataset.set_geo_transform(&raster.transform().to_gdal())?;
    set_dataset_crs(&mut dataset, raster.crs())?;

    let mut band = dataset.rasterband(1)?;
    if let Some(nodata) = raster.nodata() {
        if let Some(nd) = num_traits::cast(nodata) {
            band.set_no_data_value(Some(nd))?;
        }
    }

    let data: Vec<T> = raster.data().iter().copied().collect();
    let buffer = Buffer::new((cols, rows), data);
    band.write((0, 0), (cols, rows), &buffer)?;

    Ok(())
}

/// Write three u8 channel rasters as one RGB GeoTIFF.
///
/// The channels must share one grid; the first channel's transform and CRS
/// are written to the dataset.
pub fn write_rgb_geotiff<P>(
    red: &Raster<u8>,
    green: &Raster<u8>,
    blue: &Raster<u8>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    P: AsRef<Path>,
{
    red.assert_same_grid(green)?;
    red.assert_same_grid(blue)?;

    let opts = options.unwrap_or_default();
    let (rows, cols) = red.shape();
    let mut dataset = create_dataset::<u8>(path.as_ref(), cols, rows, 3, &opts)?;

    dataset.set_geo_transform(&red.transform().to_gdal())?;
    set_dataset_crs(&mut dataset, red.crs())?;

    for (idx, channel) in [red, green, blue].into_iter().enumerate() {
        let mut band = dataset.rasterband(idx + 1)?;
        let data: Vec<u8> = channel.data().iter().copied().collect();
        let buffer = Buffer::new((cols, rows), data);
        band.write((0, 0), (cols, rows), &buffer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn write_read_roundtrip() {
        let mut raster: Raster<f32> = Raster::new(20, 20);
        raster.set_transform(GeoTransform::new(500_000.0, 4_200_000.0, 30.0, -30.0));
        raster.set_crs(Some(Crs::from_epsg(32619)));
        raster.set_nodata(Some(0.0));
        for i in 0..20 {
            for j in 0..20 {
                raster.set(i, j, (i * 20 + j) as f32).unwrap();
            }
        }

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();

        let loaded: Raster<f32> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(loaded.shape(), raster.shape());
        assert_eq!(loaded.get(5, 7).unwrap(), raster.get(5, 7).unwrap());
        assert_eq!(loaded.nodata(), Some(0.0));
        assert_eq!(loaded.crs().and_then(|c| c.epsg()), Some(32619));
    }
}
