use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AodError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid neighborhood width: {0} (must be at least 1)")]
    InvalidWidth(usize),

    #[error("Invalid geotransform {0:?}: {1}")]
    InvalidGeotransform([f64; 6], &'static str),

    #[error("Invalid station coordinate: lat={0}, lon={1}")]
    InvalidCoordinate(f64, f64),

    #[error("Pixel ({row}, {col}) is outside the {rows}x{cols} raster")]
    OutOfExtent {
        row: i64,
        col: i64,
        rows: usize,
        cols: usize,
    },

    #[error("Input raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Invalid output bounds: [{0}, {1}, {2}, {3}] (expected minX < maxX, minY < maxY)")]
    InvalidBounds(f64, f64, f64, f64),

    #[error("Expected 4 bound values (minX minY maxX maxY), got {0}")]
    InvalidBoundsCount(usize),

    #[error("Invalid output resolution: {0} (must be positive)")]
    InvalidResolution(f64),

    #[error("Invalid resampling method: {0}")]
    InvalidResampling(String),

    #[error("gdalwarp failed: {0}")]
    WarpFailed(String),

    #[error("Invalid AERONET row {line}: {reason}")]
    InvalidAeronetRow { line: u64, reason: String },

    #[error("No sub-datasets found in {0}")]
    NoSubdatasets(PathBuf),
}

pub type Result<T> = std::result::Result<T, AodError>;
