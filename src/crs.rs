use crate::error::Result;
use gdal::spatial_ref::SpatialRef;
use log::debug;

pub const WGS84_EPSG: u32 = 4326;

/// WKT of the WGS84 geographic CRS used for converted bands
pub fn wgs84_wkt() -> Result<String> {
    let srs = SpatialRef::from_epsg(WGS84_EPSG)?;
    Ok(srs.to_wkt()?)
}

/// Check that a raster's CRS is geographic, so station lat/lon can be
/// inverted through its geotransform directly.
///
/// Only logs at debug level; callers warn once per product or raster.
pub fn is_geographic(projection_wkt: &str) -> bool {
    if projection_wkt.trim().is_empty() {
        debug!("Raster has no projection, cannot confirm lat/lon axes");
        return false;
    }

    let spatial_ref = match SpatialRef::from_wkt(projection_wkt) {
        Ok(sr) => sr,
        Err(e) => {
            debug!("Failed to parse projection WKT: {}", e);
            return false;
        }
    };

    let geographic = spatial_ref.is_geographic();
    debug!(
        "Raster CRS geographic={} projected={}",
        geographic,
        spatial_ref.is_projected()
    );
    geographic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_is_geographic() {
        let wkt = wgs84_wkt().unwrap();
        assert!(is_geographic(&wkt));
    }

    #[test]
    fn test_projected_is_not_geographic() {
        let utm = SpatialRef::from_epsg(32648).unwrap().to_wkt().unwrap();
        assert!(!is_geographic(&utm));
    }

    #[test]
    fn test_empty_projection() {
        assert!(!is_geographic(""));
    }
}
