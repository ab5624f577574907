//! Main Raster type

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores one band's values in row-major order together with the
/// affine transform, CRS and nodata sentinel needed to interpret them. All
/// derived products in the pipeline carry the grid of the clipped band they
/// were computed from.
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions { rows, cols });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self {
            data: array,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        })
    }

    /// New raster of a possibly different element type sharing this
    /// raster's transform and CRS. The nodata sentinel is not carried over.
    pub fn with_same_grid<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Raster with identical dimensions and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure `row < self.rows()` and `col < self.cols()`
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Set value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure `row < self.rows()` and `col < self.cols()`
    pub unsafe fn set_unchecked(&mut self, row: usize, col: usize, value: T) {
        unsafe {
            *self.data.uget_mut((row, col)) = value;
        }
    }

    /// Reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.crs = crs;
    }

    /// Get the no-data sentinel
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data sentinel
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Check if a value is no-data for this raster
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Iterator over valid (non-nodata) cell values
    pub fn valid_values(&self) -> impl Iterator<Item = T> + '_ {
        self.data
            .iter()
            .copied()
            .filter(move |v| !v.is_nodata(self.nodata))
    }

    /// Check that another raster shares this raster's grid: identical
    /// dimensions, transform and CRS. Band algebra requires this.
    pub fn assert_same_grid<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::SizeMismatch {
                expected_rows: self.rows(),
                expected_cols: self.cols(),
                actual_rows: other.rows(),
                actual_cols: other.cols(),
            });
        }
        if let (Some(a), Some(b)) = (self.crs(), other.crs()) {
            if !a.is_equivalent(b) {
                return Err(Error::CrsMismatch(a.identifier(), b.identifier()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_and_access() {
        let mut raster: Raster<f32> = Raster::new(10, 20);
        assert_eq!(raster.shape(), (10, 20));
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(Raster::<u16>::from_vec(vec![1, 2, 3], 2, 2).is_err());
        let r = Raster::<u16>::from_vec(vec![1, 2, 3, 4], 2, 2).unwrap();
        assert_eq!(r.get(1, 1).unwrap(), 4);
    }

    #[test]
    fn valid_values_skips_nodata() {
        let mut r: Raster<f64> = Raster::filled(2, 2, 1.0);
        r.set_nodata(Some(-9999.0));
        r.set(0, 0, -9999.0).unwrap();
        r.set(0, 1, f64::NAN).unwrap();
        assert_eq!(r.valid_values().count(), 2);
    }

    #[test]
    fn same_grid_detects_size_mismatch() {
        let a: Raster<f64> = Raster::new(4, 4);
        let b: Raster<f64> = Raster::new(4, 5);
        assert!(a.assert_same_grid(&b).is_err());
        let c: Raster<u8> = Raster::new(4, 4);
        assert!(a.assert_same_grid(&c).is_ok());
    }

    #[test]
    fn same_grid_detects_crs_mismatch() {
        let mut a: Raster<f64> = Raster::new(4, 4);
        let mut b: Raster<f64> = Raster::new(4, 4);
        a.set_crs(Some(Crs::from_epsg(32619)));
        b.set_crs(Some(Crs::from_epsg(4326)));
        assert!(a.assert_same_grid(&b).is_err());
    }
}
