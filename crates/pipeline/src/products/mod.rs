//! Band algebra engine
//!
//! Derived raster products computed pixel-wise from grid-aligned clipped
//! bands:
//!
//! - [`surface_temperature`] — thermal DN → radiance → brightness
//!   temperature (°C), optional emissivity correction
//! - [`ndsi`] — normalized difference snow index from green and SWIR
//! - [`true_color`] — 8-bit RGB composite from reflectance bands
//! - [`binary_mask`] — thresholded two-valued classification
//!
//! Every computation is pure and deterministic given its inputs; none of
//! them consults the tag store — the stage layer reads and writes tags
//! around each call.

mod indices;
mod mask;
mod temperature;
mod true_color;

pub use indices::{ndsi, normalized_difference};
pub use mask::{binary_mask, MASK_NODATA, MASK_OUTSIDE, MASK_SNOW};
pub use temperature::{surface_temperature, TemperatureParams, CELSIUS_OFFSET};
pub use true_color::{true_color, TrueColorImage, TrueColorParams};

use crate::error::{Error, Result};
use ndarray::Array2;
use nivis_core::Raster;

/// Assemble a float product raster on the template's grid, with NaN as the
/// nodata sentinel.
pub(crate) fn float_product(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.with_same_grid::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::Core(nivis_core::Error::Other(e.to_string())))?;
    Ok(output)
}
