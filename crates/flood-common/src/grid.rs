//! Raster grid descriptors: affine georeferencing plus pixel dimensions.

use crate::error::{CommonError, CommonResult};
use crate::{BoundingBox, Crs};
use serde::{Deserialize, Serialize};

/// Affine pixel-to-world transform.
///
/// Maps a fractional pixel position (col, row), measured from the top-left
/// corner of the top-left pixel, to world coordinates:
///
/// ```text
/// x = origin_x + col * pixel_width  + row * rotation_x
/// y = origin_y + col * rotation_y   - row * pixel_height
/// ```
///
/// Both pixel sizes are stored positive; rows advance southwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    #[serde(default)]
    pub rotation_x: f64,
    #[serde(default)]
    pub rotation_y: f64,
}

impl GeoTransform {
    /// North-up transform without rotation.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            rotation_x: 0.0,
            rotation_y: 0.0,
        }
    }

    /// North-up transform that spreads `width` x `height` pixels over `bbox`.
    pub fn from_bounds(bbox: &BoundingBox, width: usize, height: usize) -> Self {
        Self::new(
            bbox.min_x,
            bbox.max_y,
            bbox.width() / width.max(1) as f64,
            bbox.height() / height.max(1) as f64,
        )
    }

    /// Build from the GDAL six-coefficient ordering
    /// `[origin_x, a, b, origin_y, d, e]` where `e` is negative for north-up rasters.
    pub fn from_gdal(gt: [f64; 6]) -> CommonResult<Self> {
        if gt[5] >= 0.0 {
            return Err(CommonError::InvalidTransform(format!(
                "south-up rasters are not supported (e = {})",
                gt[5]
            )));
        }
        let transform = Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            origin_y: gt[3],
            rotation_y: gt[4],
            pixel_height: -gt[5],
        };
        transform.validate()?;
        Ok(transform)
    }

    /// The GDAL six-coefficient representation.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.rotation_x,
            self.origin_y,
            self.rotation_y,
            -self.pixel_height,
        ]
    }

    /// Check pixel sizes are strictly positive and the matrix is invertible.
    pub fn validate(&self) -> CommonResult<()> {
        let finite = [
            self.origin_x,
            self.origin_y,
            self.pixel_width,
            self.pixel_height,
            self.rotation_x,
            self.rotation_y,
        ]
        .iter()
        .all(|v| v.is_finite());

        if !finite {
            return Err(CommonError::InvalidTransform(
                "non-finite coefficient".to_string(),
            ));
        }
        if self.pixel_width <= 0.0 || self.pixel_height <= 0.0 {
            return Err(CommonError::InvalidTransform(format!(
                "pixel size must be positive, got {} x {}",
                self.pixel_width, self.pixel_height
            )));
        }
        if self.determinant().abs() < f64::EPSILON * self.pixel_width * self.pixel_height {
            return Err(CommonError::InvalidTransform(
                "transform is not invertible".to_string(),
            ));
        }
        Ok(())
    }

    fn determinant(&self) -> f64 {
        -self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y
    }

    /// World coordinates of a fractional pixel position.
    #[inline]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.rotation_x,
            self.origin_y + col * self.rotation_y - row * self.pixel_height,
        )
    }

    /// Fractional pixel position of a world coordinate.
    #[inline]
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let det = self.determinant();
        let col = (-self.pixel_height * dx - self.rotation_x * dy) / det;
        let row = (-self.rotation_y * dx + self.pixel_width * dy) / det;
        (col, row)
    }

    /// Same origin, pixels `factor` times larger in both directions.
    pub fn scaled(&self, factor: usize) -> Self {
        let f = factor as f64;
        Self {
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            pixel_width: self.pixel_width * f,
            pixel_height: self.pixel_height * f,
            rotation_x: self.rotation_x * f,
            rotation_y: self.rotation_y * f,
        }
    }
}

/// Immutable description of a raster's pixel grid.
///
/// `crs` is `None` for rasters whose source carried no coordinate reference;
/// the aligner assigns the configured default before any geometry is compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    pub crs: Option<Crs>,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl RasterGrid {
    /// Create a grid, validating dimensions and the transform.
    pub fn new(
        crs: Option<Crs>,
        transform: GeoTransform,
        width: usize,
        height: usize,
    ) -> CommonResult<Self> {
        if width == 0 || height == 0 {
            return Err(CommonError::InvalidGrid(format!(
                "dimensions must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        transform.validate()?;

        Ok(Self {
            crs,
            transform,
            width,
            height,
        })
    }

    /// North-up grid covering `bbox` with the given dimensions.
    pub fn from_bounds(
        crs: Option<Crs>,
        bbox: &BoundingBox,
        width: usize,
        height: usize,
    ) -> CommonResult<Self> {
        if !bbox.has_area() {
            return Err(CommonError::InvalidGrid(format!(
                "bounds have no area: {:?}",
                bbox
            )));
        }
        Self::new(crs, GeoTransform::from_bounds(bbox, width, height), width, height)
    }

    /// Return a copy tagged with `crs`.
    pub fn with_crs(&self, crs: Crs) -> Self {
        Self {
            crs: Some(crs),
            ..self.clone()
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// A valid grid always holds at least one cell.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Larger of width and height.
    pub fn max_dimension(&self) -> usize {
        self.width.max(self.height)
    }

    /// Pixel size (x, y), both positive.
    pub fn resolution(&self) -> (f64, f64) {
        (self.transform.pixel_width, self.transform.pixel_height)
    }

    /// World coordinates of the center of cell (col, row).
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform
            .pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Extent in the grid's own CRS units (envelope of the four corners).
    pub fn bounds(&self) -> BoundingBox {
        let (w, h) = (self.width as f64, self.height as f64);
        let corners = [
            self.transform.pixel_to_world(0.0, 0.0),
            self.transform.pixel_to_world(w, 0.0),
            self.transform.pixel_to_world(0.0, h),
            self.transform.pixel_to_world(w, h),
        ];
        // The transform is validated finite, so the corners are too.
        BoundingBox::from_points(&corners)
            .unwrap_or_else(|| BoundingBox::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN))
    }

    /// Grid produced by aggregating `factor` x `factor` pixel blocks, trailing
    /// partial blocks trimmed. `None` when a dimension collapses to zero.
    pub fn downsampled(&self, factor: usize) -> Option<Self> {
        if factor <= 1 {
            return Some(self.clone());
        }
        let width = self.width / factor;
        let height = self.height / factor;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            crs: self.crs,
            transform: self.transform.scaled(factor),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> RasterGrid {
        RasterGrid::new(
            Some(Crs::WGS84),
            GeoTransform::new(10.0, 50.0, 0.5, 0.25),
            4,
            8,
        )
        .unwrap()
    }

    #[test]
    fn test_grid_bounds() {
        let grid = sample_grid();
        assert_eq!(grid.bounds(), BoundingBox::new(10.0, 48.0, 12.0, 50.0));
        assert_eq!(grid.cell_center(0, 0), (10.25, 49.875));
    }

    #[test]
    fn test_grid_rejects_degenerate() {
        assert!(RasterGrid::new(None, GeoTransform::new(0.0, 0.0, 1.0, 1.0), 0, 3).is_err());
        assert!(RasterGrid::new(None, GeoTransform::new(0.0, 0.0, 0.0, 1.0), 3, 3).is_err());
        assert!(RasterGrid::new(None, GeoTransform::new(0.0, 0.0, 1.0, -1.0), 3, 3).is_err());
    }

    #[test]
    fn test_world_pixel_roundtrip_with_rotation() {
        let mut gt = GeoTransform::new(100.0, 200.0, 2.0, 3.0);
        gt.rotation_x = 0.5;
        gt.rotation_y = -0.25;
        gt.validate().unwrap();

        let (x, y) = gt.pixel_to_world(3.5, 7.25);
        let (col, row) = gt.world_to_pixel(x, y);
        assert!((col - 3.5).abs() < 1e-9);
        assert!((row - 7.25).abs() < 1e-9);
    }

    #[test]
    fn test_gdal_roundtrip() {
        let gt = GeoTransform::from_gdal([5.0, 0.1, 0.0, 45.0, 0.0, -0.1]).unwrap();
        assert_eq!(gt.pixel_height, 0.1);
        assert_eq!(gt.to_gdal(), [5.0, 0.1, 0.0, 45.0, 0.0, -0.1]);
        assert!(GeoTransform::from_gdal([5.0, 0.1, 0.0, 45.0, 0.0, 0.1]).is_err());
    }

    #[test]
    fn test_downsampled_trims_partial_blocks() {
        let grid = sample_grid();
        let down = grid.downsampled(3).unwrap();
        assert_eq!((down.width, down.height), (1, 2));
        assert_eq!(down.resolution(), (1.5, 0.75));
        assert_eq!(down.transform.origin_x, 10.0);

        assert!(grid.downsampled(5).is_none());
        assert_eq!(grid.downsampled(1).unwrap(), grid);
    }

    #[test]
    fn test_from_bounds() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 5.0);
        let grid = RasterGrid::from_bounds(None, &bbox, 20, 10).unwrap();
        assert_eq!(grid.resolution(), (0.5, 0.5));
        assert_eq!(grid.bounds(), bbox);

        let flat = BoundingBox::new(0.0, 0.0, 10.0, 0.0);
        assert!(RasterGrid::from_bounds(None, &flat, 20, 10).is_err());
    }
}
