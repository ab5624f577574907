//! Zonal statistics
//!
//! Scalar reductions over derived rasters. The ROI geometry is already
//! implicit in a clipped raster's extent — every valid pixel lies inside
//! the ROI — so these reductions only need to separate valid pixels from
//! nodata.

use crate::error::{Error, Result};
use nivis_core::{Raster, RasterElement};

/// Mean of all valid (non-nodata) pixel values.
///
/// Fails with [`Error::EmptyRoi`] when the raster holds no valid pixel at
/// all — the scene has no usable ROI coverage and is excluded from the
/// time series.
pub fn mean_valid(raster: &Raster<f64>) -> Result<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in raster.valid_values() {
        sum += value;
        count += 1;
    }
    if count == 0 {
        return Err(Error::EmptyRoi);
    }
    Ok(sum / count as f64)
}

/// Minimum and maximum of all valid pixel values.
///
/// Used by the temperature stage to maintain the global display
/// boundaries across scenes.
pub fn min_max_valid(raster: &Raster<f64>) -> Result<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut seen = false;
    for value in raster.valid_values() {
        seen = true;
        if value < min {
            min = value;
        }
        if value > max {
            max = value;
        }
    }
    if !seen {
        return Err(Error::EmptyRoi);
    }
    Ok((min, max))
}

/// Percentage of valid pixels equal to `class`, rounded to two decimals.
///
/// For a snow mask this is the snow-cover percentage of the ROI. Nodata
/// pixels are excluded from both numerator and denominator; an all-nodata
/// raster fails with [`Error::EmptyRoi`].
pub fn class_percentage<T: RasterElement>(mask: &Raster<T>, class: T) -> Result<f64> {
    let mut matching = 0usize;
    let mut valid = 0usize;
    for value in mask.valid_values() {
        valid += 1;
        if value == class {
            matching += 1;
        }
    }
    if valid == 0 {
        return Err(Error::EmptyRoi);
    }
    let percentage = matching as f64 / valid as f64 * 100.0;
    Ok((percentage * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::{MASK_NODATA, MASK_OUTSIDE, MASK_SNOW};
    use approx::assert_relative_eq;

    #[test]
    fn mean_skips_nodata() {
        let mut r: Raster<f64> = Raster::filled(2, 2, 10.0);
        r.set_nodata(Some(f64::NAN));
        r.set(0, 0, 20.0).unwrap();
        r.set(1, 1, f64::NAN).unwrap();

        // (20 + 10 + 10) / 3
        assert_relative_eq!(mean_valid(&r).unwrap(), 40.0 / 3.0);
    }

    #[test]
    fn all_nodata_is_empty_roi() {
        let mut r: Raster<f64> = Raster::filled(3, 3, f64::NAN);
        r.set_nodata(Some(f64::NAN));
        assert!(matches!(mean_valid(&r).unwrap_err(), Error::EmptyRoi));
        assert!(matches!(min_max_valid(&r).unwrap_err(), Error::EmptyRoi));
    }

    #[test]
    fn min_max_over_valid_pixels() {
        let mut r: Raster<f64> = Raster::filled(2, 2, 5.0);
        r.set_nodata(Some(f64::NAN));
        r.set(0, 0, -12.5).unwrap();
        r.set(1, 1, 31.0).unwrap();

        assert_eq!(min_max_valid(&r).unwrap(), (-12.5, 31.0));
    }

    #[test]
    fn snow_percentage_rounded_to_two_decimals() {
        // 1 snow pixel of 3 valid → 33.33%
        let mut mask: Raster<u8> = Raster::filled(2, 2, MASK_OUTSIDE);
        mask.set_nodata(Some(MASK_NODATA));
        mask.set(0, 0, MASK_SNOW).unwrap();
        mask.set(1, 1, MASK_NODATA).unwrap();

        assert_relative_eq!(class_percentage(&mask, MASK_SNOW).unwrap(), 33.33);
    }

    #[test]
    fn empty_mask_is_empty_roi() {
        let mut mask: Raster<u8> = Raster::filled(2, 2, MASK_NODATA);
        mask.set_nodata(Some(MASK_NODATA));
        assert!(matches!(
            class_percentage(&mask, MASK_SNOW).unwrap_err(),
            Error::EmptyRoi
        ));
    }
}
