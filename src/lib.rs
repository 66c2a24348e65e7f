// Library exports for testing and reuse

pub mod aeronet;
pub mod cli;
pub mod crs;
pub mod error;
pub mod geotransform;
pub mod himawari;
pub mod io;
pub mod matchup;
pub mod sampler;
pub mod stats;
pub mod warp;

// Re-export commonly used types
pub use error::{AodError, Result};
pub use geotransform::Geotransform;
pub use io::{read_band, write_geotiff, RasterMetadata};
pub use sampler::{sample, Members, Neighborhood, NoDataReason, Sample, Shape};
