//! Normalized difference spectral indices

use crate::error::Result;
use crate::maybe_rayon::*;
use crate::products::float_product;
use nivis_core::{Raster, RasterElement};

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in [-1, 1] for non-negative inputs. Pixels where either band
/// is nodata, or where the sum is zero (division by zero), are set to NaN
/// rather than propagating infinities.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    band_a.assert_same_grid(band_b)?;

    let (rows, cols) = band_a.shape();
    let nodata_a = band_a.nodata();
    let nodata_b = band_b.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if a.is_nodata(nodata_a) || b.is_nodata(nodata_b) {
                    continue;
                }

                let sum = a + b;
                if sum.abs() < 1e-10 {
                    continue; // Avoid division by zero
                }

                row_data[col] = (a - b) / sum;
            }
            row_data
        })
        .collect();

    float_product(band_a, rows, cols, data)
}

/// Normalized Difference Snow Index (Dozier, 1989)
///
/// `NDSI = (Green - SWIR) / (Green + SWIR)`
///
/// Snow reflects strongly in the visible green and absorbs in the
/// shortwave infrared; values above ~0.4 are commonly classified as snow.
pub fn ndsi(green: &Raster<f64>, swir: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(green, swir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nivis_core::GeoTransform;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    #[test]
    fn ndsi_basic_value() {
        let green = make_band(5, 5, 0.8);
        let swir = make_band(5, 5, 0.2);

        let result = ndsi(&green, &swir).unwrap();
        let val = result.get(2, 2).unwrap();
        // (0.8 - 0.2) / (0.8 + 0.2) = 0.6
        assert!((val - 0.6).abs() < 1e-10, "expected 0.6, got {val}");
    }

    #[test]
    fn equal_bands_give_zero() {
        let green = make_band(6, 4, 0.37);
        let swir = make_band(6, 4, 0.37);

        let result = ndsi(&green, &swir).unwrap();
        for row in 0..6 {
            for col in 0..4 {
                assert_eq!(result.get(row, col).unwrap(), 0.0);
            }
        }
    }

    #[test]
    fn result_within_unit_interval() {
        let mut green = make_band(10, 10, 0.0);
        let mut swir = make_band(10, 10, 0.0);
        for row in 0..10 {
            for col in 0..10 {
                green.set(row, col, (row * 10 + col) as f64 * 0.01).unwrap();
                swir.set(row, col, (99 - (row * 10 + col)) as f64 * 0.007).unwrap();
            }
        }

        let result = ndsi(&green, &swir).unwrap();
        for row in 0..10 {
            for col in 0..10 {
                let val = result.get(row, col).unwrap();
                if !val.is_nan() {
                    assert!((-1.0..=1.0).contains(&val), "NDSI out of range: {val}");
                }
            }
        }
    }

    #[test]
    fn both_zero_is_nodata_not_nan_propagation() {
        let green = make_band(3, 3, 0.0);
        let swir = make_band(3, 3, 0.0);

        let result = ndsi(&green, &swir).unwrap();
        assert!(result.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn nodata_in_either_band_propagates() {
        let mut green = make_band(3, 3, 0.5);
        green.set_nodata(Some(0.0));
        green.set(0, 0, 0.0).unwrap();
        let swir = make_band(3, 3, 0.2);

        let result = ndsi(&green, &swir).unwrap();
        assert!(result.get(0, 0).unwrap().is_nan());
        assert!(!result.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn dimension_mismatch_is_error() {
        let green = make_band(5, 5, 0.5);
        let swir = make_band(5, 6, 0.2);
        assert!(ndsi(&green, &swir).is_err());
    }
}
