//! ROI clipper
//!
//! Reduces full-footprint band rasters to the ROI's extent. For one scene
//! the output grid is computed once (from the first band, the ROI bounding
//! box and the optional target resolution) and every band is sampled onto
//! that grid, which guarantees the spatial-alignment invariant the band
//! algebra engine depends on: identical dimensions, transform and CRS
//! across all clipped bands of a scene.
//!
//! Pixels inside the window but outside the ROI polygon itself are written
//! as nodata.

use crate::error::{Error, Result};
use crate::roi::Roi;
use nivis_core::{Crs, GeoTransform, Raster};
use tracing::debug;

/// The common pixel grid shared by all clipped bands of a scene
#[derive(Debug, Clone)]
pub struct OutputGrid {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
    pub crs: Option<Crs>,
}

/// Bring the ROI into a band's CRS.
///
/// A band without CRS metadata is assumed to share the ROI's reference
/// system. A differing CRS requires the `gdal` feature for geometry
/// reprojection; without it the mismatch is an error.
pub fn roi_in_band_crs(roi: &Roi, band_crs: Option<&Crs>) -> Result<Roi> {
    match band_crs {
        None => {
            debug!("band has no CRS metadata, assuming ROI CRS");
            Ok(roi.clone())
        }
        Some(crs) if crs.is_equivalent(roi.crs()) => Ok(roi.clone()),
        Some(crs) => {
            #[cfg(feature = "gdal")]
            {
                roi.transformed_to(crs)
            }
            #[cfg(not(feature = "gdal"))]
            {
                Err(Error::Core(nivis_core::Error::CrsMismatch(
                    roi.crs().identifier(),
                    crs.identifier(),
                )))
            }
        }
    }
}

/// Compute the output grid for a scene from its first band.
///
/// The ROI must already be in the band's CRS. Fails with
/// [`Error::SpatialMismatch`] when the ROI and the raster do not overlap at
/// all — that is a data error, the scene is skipped and never retried.
pub fn output_grid(
    band: &Raster<f64>,
    roi: &Roi,
    target_resolution: Option<f64>,
) -> Result<OutputGrid> {
    let (roi_min_x, roi_min_y, roi_max_x, roi_max_y) = roi.bounds()?;
    let (band_min_x, band_min_y, band_max_x, band_max_y) = band.bounds();

    let min_x = roi_min_x.max(band_min_x);
    let max_x = roi_max_x.min(band_max_x);
    let min_y = roi_min_y.max(band_min_y);
    let max_y = roi_max_y.min(band_max_y);
    if min_x >= max_x || min_y >= max_y {
        return Err(Error::SpatialMismatch {
            detail: format!(
                "ROI [{roi_min_x:.1}, {roi_min_y:.1}, {roi_max_x:.1}, {roi_max_y:.1}] \
                 vs raster [{band_min_x:.1}, {band_min_y:.1}, {band_max_x:.1}, {band_max_y:.1}]"
            ),
        });
    }

    // Pixel window of the intersection in the source grid
    let gt = band.transform();
    let (col_a, row_a) = gt.geo_to_pixel(min_x, max_y);
    let (col_b, row_b) = gt.geo_to_pixel(max_x, min_y);
    let col0 = col_a.min(col_b).floor().max(0.0) as usize;
    let row0 = row_a.min(row_b).floor().max(0.0) as usize;
    let col1 = (col_a.max(col_b).ceil() as usize).min(band.cols());
    let row1 = (row_a.max(row_b).ceil() as usize).min(band.rows());
    if col0 >= col1 || row0 >= row1 {
        return Err(Error::SpatialMismatch {
            detail: "ROI intersection yields an empty pixel window".to_string(),
        });
    }

    let window_transform = gt.for_window(col0, row0);
    let (rows, cols, transform) = match target_resolution {
        Some(res) if (res - gt.cell_size()).abs() > f64::EPSILON => {
            let scale = gt.cell_size() / res;
            let rows = (((row1 - row0) as f64) * scale).round().max(1.0) as usize;
            let cols = (((col1 - col0) as f64) * scale).round().max(1.0) as usize;
            (rows, cols, window_transform.with_cell_size(res))
        }
        _ => (row1 - row0, col1 - col0, window_transform),
    };

    Ok(OutputGrid {
        transform,
        rows,
        cols,
        crs: band.crs().cloned(),
    })
}

/// Sample one band onto the scene's output grid and mask it to the ROI.
///
/// Nearest-neighbor sampling; source pixels are looked up through
/// geographic coordinates, so bands of deviating native resolution land on
/// the common grid. Pixels outside the ROI polygon, or outside the source
/// raster, become `nodata`.
pub fn clip_band_to_grid(
    band: &Raster<f64>,
    grid: &OutputGrid,
    roi: &Roi,
    nodata: f64,
) -> Result<Raster<f64>> {
    let mut output: Raster<f64> = Raster::new(grid.rows, grid.cols);
    output.set_transform(grid.transform);
    output.set_crs(grid.crs.clone());
    output.set_nodata(Some(nodata));

    let src_gt = *band.transform();
    let (rows, cols) = band.shape();

    for out_row in 0..grid.rows {
        for out_col in 0..grid.cols {
            let (x, y) = grid.transform.pixel_to_geo(out_col, out_row);

            let value = if roi.contains(x, y) {
                let (src_col, src_row) = src_gt.geo_to_pixel(x, y);
                let (src_col, src_row) = (src_col.floor(), src_row.floor());
                if src_col >= 0.0
                    && src_row >= 0.0
                    && (src_col as usize) < cols
                    && (src_row as usize) < rows
                {
                    let v = unsafe { band.get_unchecked(src_row as usize, src_col as usize) };
                    if band.is_nodata(v) {
                        nodata
                    } else {
                        v
                    }
                } else {
                    nodata
                }
            } else {
                nodata
            };

            unsafe { output.set_unchecked(out_row, out_col, value) };
        }
    }

    Ok(output)
}
