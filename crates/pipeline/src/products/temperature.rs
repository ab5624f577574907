//! Surface temperature from the thermal band

use crate::catalog::ThermalCalibration;
use crate::error::Result;
use crate::maybe_rayon::*;
use crate::products::float_product;
use nivis_core::{Raster, RasterElement};

/// Kelvin to Celsius offset
pub const CELSIUS_OFFSET: f64 = 273.15;

/// Effective wavelength of the Landsat 8/9 TIRS band 10, in meters
const THERMAL_WAVELENGTH_M: f64 = 10.895e-6;

/// Second radiation constant `h·c/k`, in meter-kelvin
const RADIATION_CONSTANT_MK: f64 = 1.438e-2;

/// Parameters for the temperature computation
#[derive(Debug, Clone)]
pub struct TemperatureParams {
    /// Per-scene calibration constants from the catalog entry
    pub calibration: ThermalCalibration,
    /// Surface emissivity in (0, 1]; `None` skips the correction and
    /// yields at-sensor brightness temperature
    pub emissivity: Option<f64>,
}

/// Convert thermal-band digital numbers to surface temperature in °C.
///
/// Per pixel: DN → top-of-atmosphere radiance through the linear
/// calibration (`ml·dn + al`), radiance → brightness temperature through
/// the logarithmic sensor-response inversion `K2 / ln(K1/L + 1)`, then the
/// optional single-channel emissivity correction
/// `T / (1 + (λ·T/ρ)·ln ε)`.
///
/// Nodata pixels and pixels whose radiance is non-positive propagate as
/// nodata — they are never treated as a valid zero temperature.
pub fn surface_temperature(
    thermal: &Raster<f64>,
    params: &TemperatureParams,
) -> Result<Raster<f64>> {
    let (rows, cols) = thermal.shape();
    let nodata = thermal.nodata();
    let cal = params.calibration;
    let ln_emissivity = params.emissivity.map(f64::ln);

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let dn = unsafe { thermal.get_unchecked(row, col) };
                if dn.is_nodata(nodata) {
                    continue;
                }

                let radiance = cal.radiance_mult * dn + cal.radiance_add;
                if radiance <= 0.0 {
                    continue;
                }

                let mut kelvin = cal.k2 / (cal.k1 / radiance + 1.0).ln();
                if let Some(ln_e) = ln_emissivity {
                    kelvin /= 1.0 + (THERMAL_WAVELENGTH_M * kelvin / RADIATION_CONSTANT_MK) * ln_e;
                }

                row_data[col] = kelvin - CELSIUS_OFFSET;
            }
            row_data
        })
        .collect();

    float_product(thermal, rows, cols, data)
}
