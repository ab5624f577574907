//! True-color composite from reflectance bands

use crate::error::Result;
use nivis_core::{Raster, RasterElement};

/// Parameters for the reflectance-to-display rescaling
#[derive(Debug, Clone)]
pub struct TrueColorParams {
    /// Linear scale applied to digital numbers (Collection-2 Level-2
    /// reflectance scale)
    pub reflectance_scale: f64,
    /// Additive offset applied after scaling
    pub reflectance_offset: f64,
}

impl Default for TrueColorParams {
    fn default() -> Self {
        Self {
            reflectance_scale: 2.75e-5,
            reflectance_offset: -0.2,
        }
    }
}

/// The three 8-bit channels of a true-color composite, sharing one grid
#[derive(Debug, Clone)]
pub struct TrueColorImage {
    pub red: Raster<u8>,
    pub green: Raster<u8>,
    pub blue: Raster<u8>,
}

/// Stack red, green and blue reflectance bands into a displayable 8-bit
/// composite.
///
/// Digital numbers are converted to reflectance through the linear
/// calibration, then rescaled from [0, 1] to 0..=255. Out-of-range
/// reflectance is clamped, never wrapped. A pixel that is nodata in any
/// input band is black on all three channels.
pub fn true_color(
    red: &Raster<f64>,
    green: &Raster<f64>,
    blue: &Raster<f64>,
    params: &TrueColorParams,
) -> Result<TrueColorImage> {
    red.assert_same_grid(green)?;
    red.assert_same_grid(blue)?;

    let (rows, cols) = red.shape();
    let bands = [red, green, blue];
    let nodata = [red.nodata(), green.nodata(), blue.nodata()];

    let mut channels: Vec<Raster<u8>> = (0..3)
        .map(|_| {
            let mut c = red.with_same_grid::<u8>(rows, cols);
            c.set_nodata(Some(0));
            c
        })
        .collect();

    for row in 0..rows {
        for col in 0..cols {
            let dns = [
                unsafe { bands[0].get_unchecked(row, col) },
                unsafe { bands[1].get_unchecked(row, col) },
                unsafe { bands[2].get_unchecked(row, col) },
            ];
            let any_nodata = dns
                .iter()
                .zip(nodata.iter())
                .any(|(dn, nd)| dn.is_nodata(*nd));

            for (channel, dn) in channels.iter_mut().zip(dns) {
                let value = if any_nodata {
                    0
                } else {
                    let reflectance =
                        params.reflectance_scale * dn + params.reflectance_offset;
                    (reflectance.clamp(0.0, 1.0) * 255.0).round() as u8
                };
                unsafe { channel.set_unchecked(row, col, value) };
            }
        }
    }

    let blue = channels.pop().expect("three channels");
    let green = channels.pop().expect("three channels");
    let red = channels.pop().expect("three channels");
    Ok(TrueColorImage { red, green, blue })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nivis_core::GeoTransform;

    fn band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(4, 4, value);
        r.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        r.set_nodata(Some(0.0));
        r
    }

    #[test]
    fn mid_reflectance_maps_linearly() {
        // DN such that reflectance = 2.75e-5 * dn - 0.2 = 0.4
        let dn = (0.4 + 0.2) / 2.75e-5;
        let image = true_color(&band(dn), &band(dn), &band(dn), &TrueColorParams::default())
            .unwrap();
        let value = image.red.get(1, 1).unwrap();
        assert_eq!(value, (0.4f64 * 255.0).round() as u8);
        assert_eq!(image.green.get(1, 1).unwrap(), value);
    }

    #[test]
    fn out_of_range_is_clamped_not_wrapped() {
        // Maximum u16 DN pushes reflectance above 1
        let bright = true_color(
            &band(65_535.0),
            &band(65_535.0),
            &band(65_535.0),
            &TrueColorParams::default(),
        )
        .unwrap();
        assert_eq!(bright.red.get(0, 0).unwrap(), 255);

        // A DN just above fill still maps below the offset, clamping to 0
        let dark = true_color(
            &band(10.0),
            &band(10.0),
            &band(10.0),
            &TrueColorParams::default(),
        )
        .unwrap();
        assert_eq!(dark.blue.get(0, 0).unwrap(), 0);
    }

    #[test]
    fn nodata_in_any_band_blacks_all_channels() {
        let red = band(20_000.0);
        let mut green = band(20_000.0);
        green.set(2, 2, 0.0).unwrap();
        let blue = band(20_000.0);

        let image = true_color(&red, &green, &blue, &TrueColorParams::default()).unwrap();
        assert_eq!(image.red.get(2, 2).unwrap(), 0);
        assert_eq!(image.blue.get(2, 2).unwrap(), 0);
        assert_ne!(image.red.get(0, 0).unwrap(), 0);
    }

    #[test]
    fn channels_share_the_input_grid() {
        let image = true_color(
            &band(20_000.0),
            &band(20_000.0),
            &band(20_000.0),
            &TrueColorParams::default(),
        )
        .unwrap();
        assert!(image.red.assert_same_grid(&image.green).is_ok());
        assert!(image.red.assert_same_grid(&image.blue).is_ok());
    }
}
