use crate::error::{AodError, Result};
use crate::geotransform::Geotransform;
use gdal::raster::{Buffer, RasterBand};
use gdal::{Dataset, DriverManager};
use log::{debug, info};
use ndarray::Array2;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
    pub nodata: Option<f64>,
}

impl RasterMetadata {
    pub fn geotransform(&self) -> Result<Geotransform> {
        Geotransform::new(self.geotransform)
    }
}

/// Extract metadata from a dataset without reading pixel data
pub fn extract_metadata_from_dataset(dataset: &Dataset) -> Result<RasterMetadata> {
    let rasterband: RasterBand = dataset.rasterband(1)?;

    let width = rasterband.x_size() as usize;
    let height = rasterband.y_size() as usize;

    if width == 0 || height == 0 {
        return Err(AodError::InvalidDimensions(width, height));
    }

    Ok(RasterMetadata {
        width,
        height,
        geotransform: dataset.geo_transform()?,
        projection: dataset.projection(),
        nodata: rasterband.no_data_value(),
    })
}

/// Read band 1 of a raster (file path or GDAL sub-dataset name) as f64
pub fn read_band(path: impl AsRef<Path>) -> Result<(Array2<f64>, RasterMetadata)> {
    let path = path.as_ref();
    debug!("Opening raster: {}", path.display());
    let dataset = Dataset::open(path)?;
    let metadata = extract_metadata_from_dataset(&dataset)?;

    let rasterband = dataset.rasterband(1)?;
    let (width, height) = (metadata.width, metadata.height);
    let buffer = rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
    let data_vec: Vec<f64> = buffer.into_iter().collect();
    let data = Array2::from_shape_vec((height, width), data_vec)?;

    debug!(
        "Read {}x{} raster, nodata={:?}",
        width, height, metadata.nodata
    );
    Ok((data, metadata))
}

/// Read band 1 of a dataset as f32, the native type of Himawari bands
pub fn read_band_f32(dataset: &Dataset, metadata: &RasterMetadata) -> Result<Array2<f32>> {
    let rasterband = dataset.rasterband(1)?;
    let (width, height) = (metadata.width, metadata.height);
    let buffer = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
    let data_vec: Vec<f32> = buffer.into_iter().collect();
    Ok(Array2::from_shape_vec((height, width), data_vec)?)
}

/// Write a single-band float32 GeoTIFF
pub fn write_geotiff(
    path: impl AsRef<Path>,
    data: &Array2<f32>,
    geotransform: &[f64; 6],
    projection: &str,
    nodata: f64,
) -> Result<()> {
    let path = path.as_ref();
    info!("Creating output raster: {}", path.display());

    let (height, width) = data.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset = driver.create_with_band_type::<f32, _>(path, width, height, 1)?;

    dataset.set_geo_transform(geotransform)?;
    dataset.set_projection(projection)?;

    let mut raster_band = dataset.rasterband(1)?;
    // Row-major, matching GDAL's expected layout
    let values: Vec<f32> = data.iter().copied().collect();
    let mut buffer = Buffer::new((width, height), values);
    raster_band.write((0, 0), (width, height), &mut buffer)?;
    raster_band.set_no_data_value(Some(nodata))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::wgs84_wkt;
    use ndarray::arr2;

    #[test]
    fn test_write_then_read_geotiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");
        let data = arr2(&[[0.1f32, 0.2, -9999.0], [0.4, 0.5, 0.6]]);
        let geotransform = [100.0, 0.05, 0.0, 25.0, 0.0, -0.05];

        write_geotiff(&path, &data, &geotransform, &wgs84_wkt().unwrap(), -9999.0).unwrap();
        let (read, metadata) = read_band(&path).unwrap();

        assert_eq!(metadata.width, 3);
        assert_eq!(metadata.height, 2);
        assert_eq!(metadata.nodata, Some(-9999.0));
        assert_eq!(metadata.geotransform, geotransform);
        assert_eq!(read.dim(), (2, 3));
        assert!((read[[1, 2]] - 0.6).abs() < 1e-6);
        assert_eq!(read[[0, 2]], -9999.0);
    }

    #[test]
    fn test_read_missing_raster_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_band(dir.path().join("missing.tif")).is_err());
    }
}
