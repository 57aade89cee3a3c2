//! Georeferenced grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a dense row-major grid together
/// with its affine transform, its spatial reference, a no-data sentinel and
/// an identifying name. The buffer is owned exclusively; operations that
/// derive a new grid return a new `Raster`.
///
/// # Example
///
/// ```ignore
/// use riverhsi_core::Raster;
///
/// let mut depth: Raster<f64> = Raster::new(100, 100);
/// depth.set(10, 20, 0.42)?;
/// let value = depth.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cells indexed (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    /// Always resolved, WGS84 when nothing better is known
    crs: CRS,
    nodata: Option<T>,
    /// Identifying name, usually the file stem
    name: String,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled grid on the default georeference (WGS84, unit pixels)
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from existing row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: CRS::default(),
            nodata: Some(T::default_nodata()),
            name: String::new(),
        }
    }

    /// Create a zero-filled raster with the same georeference but a different cell type
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: Some(U::default_nodata()),
            name: self.name.clone(),
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at (row, col), or an out-of-bounds error
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

    /// Overwrite one cell
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

    /// Borrowed view of the grid
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Replace the whole grid. The new grid must keep the raster's shape.
    pub fn replace_data(&mut self, data: Array2<T>) -> Result<()> {
        if data.dim() != self.data.dim() {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar,
                ac,
            });
        }
        self.data = data;
        Ok(())
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn set_crs(&mut self, crs: CRS) {
        self.crs = crs;
    }

    /// Sentinel marking missing cells; NaN is always missing for floats
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Raster name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the raster
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pixel width in CRS units
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Map bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Map coordinates of a pixel centre
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Pixel (col, row) containing the given map coordinates, if inside the grid
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> Result<Option<(usize, usize)>> {
        let (col, row) = self.transform.geo_to_pixel(x, y)?;
        if col < 0 || row < 0 || col as usize >= self.cols() || row as usize >= self.rows() {
            return Ok(None);
        }
        Ok(Some((col as usize, row as usize)))
    }

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    /// Value at (row, col) as f64, or `None` for no-data
    pub fn value_f64(&self, row: usize, col: usize) -> Option<f64> {
        let value = self.data.get((row, col)).copied()?;
        if self.is_nodata(value) {
            return None;
        }
        value.to_f64()
    }

    /// Min, max and mean over valid cells
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut stats = RasterStatistics {
            min: None,
            max: None,
            mean: None,
            valid_count: 0,
            nodata_count: 0,
        };
        let mut sum = 0.0;
        for &v in self.data.iter().filter(|&&v| !self.is_nodata(v)) {
            stats.min = Some(stats.min.map_or(v, |m| if v < m { v } else { m }));
            stats.max = Some(stats.max.map_or(v, |m| if v > m { v } else { m }));
            sum += v.to_f64().unwrap_or(0.0);
            stats.valid_count += 1;
        }
        stats.nodata_count = self.len() - stats.valid_count;
        if stats.valid_count > 0 {
            stats.mean = Some(sum / stats.valid_count as f64);
        }
        stats
    }
}

/// Summary of the valid cells of a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.crs().code(), 4326);
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn test_from_vec_dimension_check() {
        assert!(Raster::<f64>::from_vec(vec![0.0; 5], 2, 3).is_err());
        let r = Raster::<f64>::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        assert_eq!(r.get(1, 0).unwrap(), 4.0);
    }

    #[test]
    fn test_replace_data_keeps_shape() {
        let mut r: Raster<f64> = Raster::new(2, 2);
        assert!(r.replace_data(Array2::zeros((3, 2))).is_err());
        r.replace_data(Array2::from_elem((2, 2), 7.0)).unwrap();
        assert_eq!(r.get(1, 1).unwrap(), 7.0);
    }

    #[test]
    fn test_raster_statistics_skip_nodata() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set_nodata(Some(-9999.0));
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f64).unwrap();
            }
        }
        raster.set(0, 0, -9999.0).unwrap();
        raster.set(9, 9, f64::NAN).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(98.0));
        assert_eq!(stats.valid_count, 98);
        assert_eq!(stats.nodata_count, 2);
    }

    #[test]
    fn test_geo_to_pixel_bounds() {
        let mut raster: Raster<f64> = Raster::new(4, 4);
        raster.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        assert_eq!(raster.geo_to_pixel(15.0, 25.0).unwrap(), Some((1, 1)));
        assert_eq!(raster.geo_to_pixel(45.0, 25.0).unwrap(), None);
    }
}
