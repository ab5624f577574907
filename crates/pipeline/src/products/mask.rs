//! Binary classification mask

use crate::error::Result;
use nivis_core::{Raster, RasterElement};

/// Mask value for pixels inside the classified region (snow)
pub const MASK_SNOW: u8 = 1;
/// Mask value for valid pixels outside the classified region
pub const MASK_OUTSIDE: u8 = 0;
/// Nodata sentinel of mask rasters
pub const MASK_NODATA: u8 = 255;

/// Threshold a source raster into a two-valued mask.
///
/// Pixels strictly above `threshold` become [`MASK_SNOW`], valid pixels at
/// or below it become [`MASK_OUTSIDE`], nodata propagates as
/// [`MASK_NODATA`]. The threshold is a configuration constant, never
/// inferred per scene.
pub fn binary_mask(source: &Raster<f64>, threshold: f64) -> Result<Raster<u8>> {
    let (rows, cols) = source.shape();
    let nodata = source.nodata();

    let mut mask = source.with_same_grid::<u8>(rows, cols);
    mask.set_nodata(Some(MASK_NODATA));

    for row in 0..rows {
        for col in 0..cols {
            let value = unsafe { source.get_unchecked(row, col) };
            let out = if value.is_nodata(nodata) {
                MASK_NODATA
            } else if value > threshold {
                MASK_SNOW
            } else {
                MASK_OUTSIDE
            };
            unsafe { mask.set_unchecked(row, col, out) };
        }
    }

    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nivis_core::GeoTransform;

    fn ndsi_like(values: Vec<f64>) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn thresholds_strictly_above() {
        let source = ndsi_like(vec![0.39, 0.4, 0.41, 0.9]);
        let mask = binary_mask(&source, 0.4).unwrap();

        assert_eq!(mask.get(0, 0).unwrap(), MASK_OUTSIDE);
        assert_eq!(mask.get(0, 1).unwrap(), MASK_OUTSIDE); // not strictly above
        assert_eq!(mask.get(1, 0).unwrap(), MASK_SNOW);
        assert_eq!(mask.get(1, 1).unwrap(), MASK_SNOW);
    }

    #[test]
    fn nodata_propagates() {
        let source = ndsi_like(vec![f64::NAN, 0.5, -0.2, 0.0]);
        let mask = binary_mask(&source, 0.4).unwrap();

        assert_eq!(mask.get(0, 0).unwrap(), MASK_NODATA);
        assert_eq!(mask.get(0, 1).unwrap(), MASK_SNOW);
        assert_eq!(mask.get(1, 0).unwrap(), MASK_OUTSIDE);
    }

    #[test]
    fn mask_keeps_source_grid() {
        let source = ndsi_like(vec![0.5, 0.5, 0.5, 0.5]);
        let mask = binary_mask(&source, 0.4).unwrap();
        assert!(source.assert_same_grid(&mask).is_ok());
    }
}
