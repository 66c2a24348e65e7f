use crate::error::{AodError, Result};

/// North-up affine geotransform in GDAL order:
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geotransform {
    coefficients: [f64; 6],
}

impl Geotransform {
    pub fn new(coefficients: [f64; 6]) -> Result<Self> {
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(AodError::InvalidGeotransform(
                coefficients,
                "coefficients must be finite",
            ));
        }
        if coefficients[1] == 0.0 || coefficients[5] == 0.0 {
            return Err(AodError::InvalidGeotransform(
                coefficients,
                "pixel width and height must be non-zero",
            ));
        }
        // Inverse mapping below ignores rotation terms
        if coefficients[2] != 0.0 || coefficients[4] != 0.0 {
            return Err(AodError::InvalidGeotransform(
                coefficients,
                "rotated rasters are not supported",
            ));
        }
        Ok(Self { coefficients })
    }

    pub fn origin_x(&self) -> f64 {
        self.coefficients[0]
    }

    pub fn pixel_width(&self) -> f64 {
        self.coefficients[1]
    }

    pub fn origin_y(&self) -> f64 {
        self.coefficients[3]
    }

    pub fn pixel_height(&self) -> f64 {
        self.coefficients[5]
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.coefficients
    }

    /// Fractional (row, col) offsets of a geographic coordinate from the origin
    pub fn offsets(&self, lat: f64, lon: f64) -> (f64, f64) {
        let row_offset = (lat - self.origin_y()) / self.pixel_height();
        let col_offset = (lon - self.origin_x()) / self.pixel_width();
        (row_offset, col_offset)
    }

    /// Geographic (lat, lon) of a pixel index's grid point
    pub fn coordinate(&self, row: i64, col: i64) -> (f64, f64) {
        let lat = self.origin_y() + row as f64 * self.pixel_height();
        let lon = self.origin_x() + col as f64 * self.pixel_width();
        (lat, lon)
    }
}

impl TryFrom<[f64; 6]> for Geotransform {
    type Error = AodError;

    fn try_from(coefficients: [f64; 6]) -> Result<Self> {
        Self::new(coefficients)
    }
}
