//! # nivis core
//!
//! Core raster types and I/O for the nivis scene-processing pipeline.
//!
//! This crate provides:
//! - [`Raster<T>`]: a 2D grid of band values with georeferencing metadata
//! - [`GeoTransform`]: affine pixel-to-geographic transformation
//! - [`Crs`]: coordinate reference system value type
//! - [`RasterElement`]: trait bounding the cell value types
//! - GeoTIFF reading/writing (GDAL-backed behind the `gdal` feature, with a
//!   native `tiff`-crate fallback)

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::Crs;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
