//! Matching daily AERONET means against gridded satellite AOD.
//!
//! Every (day, product) pair is an independent unit whose outcome is
//! recorded, so missing rasters and stations outside a raster are counted
//! in the report rather than aborting the run.

use crate::aeronet::DailyMean;
use crate::crs::is_geographic;
use crate::error::{AodError, Result};
use crate::io::read_band;
use gdal::Dataset;
use crate::sampler::{sample, Neighborhood, NoDataReason, Sample};
use chrono::{Datelike, NaiveDate};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_NODATA: f64 = -9999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    Viirs,
    Maiac,
}

impl Product {
    pub fn name(&self) -> &'static str {
        match self {
            Product::Viirs => "viirs",
            Product::Maiac => "maiac",
        }
    }

    /// Factor converting stored integers to AOD
    pub fn scale(&self) -> f64 {
        match self {
            Product::Viirs => 1.0,
            Product::Maiac => 0.001,
        }
    }

    /// Daily composite file name
    pub fn file_name(&self, date: NaiveDate) -> String {
        match self {
            Product::Viirs => format!("{}{:02}{:02}.tif", date.year(), date.month(), date.day()),
            // Day is not zero-padded in MAIAC composites
            Product::Maiac => format!(
                "MAIAC_composite_{}{:02}_{}.tif",
                date.year(),
                date.month(),
                date.day()
            ),
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_uppercase())
    }
}

/// A product and the directory holding its `daily average/<year>/` tree
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSource {
    pub product: Product,
    pub root: PathBuf,
}

impl ProductSource {
    pub fn new(product: Product, root: impl Into<PathBuf>) -> Self {
        Self {
            product,
            root: root.into(),
        }
    }

    pub fn raster_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join("daily average")
            .join(date.year().to_string())
            .join(self.product.file_name(date))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchFailure {
    MissingRaster(PathBuf),
    OutOfExtent(String),
    Raster(String),
}

impl From<AodError> for MatchFailure {
    fn from(e: AodError) -> Self {
        if matches!(e, AodError::OutOfExtent { .. }) {
            MatchFailure::OutOfExtent(e.to_string())
        } else {
            MatchFailure::Raster(e.to_string())
        }
    }
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchFailure::MissingRaster(path) => write!(f, "missing raster {}", path.display()),
            MatchFailure::OutOfExtent(msg) => write!(f, "station out of extent: {}", msg),
            MatchFailure::Raster(msg) => write!(f, "raster error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(f64),
    NoData(NoDataReason),
    Failed(MatchFailure),
}

impl MatchOutcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            MatchOutcome::Matched(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Sample> for MatchOutcome {
    fn from(sample: Sample) -> Self {
        match sample {
            Sample::Value(v) => MatchOutcome::Matched(v),
            Sample::NoData(reason) => MatchOutcome::NoData(reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchupConfig {
    pub sources: Vec<ProductSource>,
    pub neighborhood: Neighborhood,
    /// Used when a raster declares no no-data value
    pub default_nodata: f64,
}

fn sample_raster(
    path: &Path,
    day: &DailyMean,
    neighborhood: Neighborhood,
    default_nodata: f64,
) -> Result<Sample> {
    let (data, metadata) = read_band(path)?;
    let geotransform = metadata.geotransform()?;
    let nodata = metadata.nodata.unwrap_or(default_nodata);

    sample(
        &data.view(),
        &geotransform,
        day.lat,
        day.lon,
        neighborhood,
        nodata,
    )
}

/// CRS check on the first existing raster of a product.
///
/// Returns the raster checked and whether its CRS is geographic, or `None`
/// when no raster exists for any of `days`. Products share one CRS across
/// days, so the result stands for the whole run.
pub fn check_product_crs(source: &ProductSource, days: &[DailyMean]) -> Option<(PathBuf, bool)> {
    let path = days
        .iter()
        .map(|day| source.raster_path(day.date))
        .find(|path| path.is_file())?;

    let geographic = match Dataset::open(&path) {
        Ok(dataset) => is_geographic(&dataset.projection()),
        Err(e) => {
            debug!("Cannot open {} for CRS check: {}", path.display(), e);
            return None;
        }
    };
    Some((path, geographic))
}

/// Sample one product's raster for one day at the station
pub fn match_day(
    day: &DailyMean,
    source: &ProductSource,
    neighborhood: Neighborhood,
    default_nodata: f64,
) -> MatchOutcome {
    let path = source.raster_path(day.date);
    if !path.is_file() {
        debug!("No {} raster for {}: {}", source.product, day.date, path.display());
        return MatchOutcome::Failed(MatchFailure::MissingRaster(path));
    }

    match sample_raster(&path, day, neighborhood, default_nodata) {
        Ok(sample) => sample.scaled(source.product.scale()).into(),
        Err(e) => {
            warn!("{} {} failed: {}", source.product, day.date, e);
            MatchOutcome::Failed(e.into())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    pub day: DailyMean,
    /// One outcome per configured source, in source order
    pub outcomes: Vec<MatchOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductTally {
    pub matched: usize,
    pub no_data: usize,
    pub missing_raster: usize,
    pub out_of_extent: usize,
    pub raster_error: usize,
}

#[derive(Debug, Clone)]
pub struct MatchupReport {
    pub products: Vec<Product>,
    pub rows: Vec<MatchRow>,
}

impl MatchupReport {
    pub fn tally(&self, source_index: usize) -> ProductTally {
        let mut tally = ProductTally::default();
        for row in &self.rows {
            match &row.outcomes[source_index] {
                MatchOutcome::Matched(_) => tally.matched += 1,
                MatchOutcome::NoData(_) => tally.no_data += 1,
                MatchOutcome::Failed(MatchFailure::MissingRaster(_)) => tally.missing_raster += 1,
                MatchOutcome::Failed(MatchFailure::OutOfExtent(_)) => tally.out_of_extent += 1,
                MatchOutcome::Failed(MatchFailure::Raster(_)) => tally.raster_error += 1,
            }
        }
        tally
    }

    /// (AERONET, satellite) AOD pairs for matched days
    pub fn pairs(&self, source_index: usize) -> Vec<(f64, f64)> {
        self.rows
            .iter()
            .filter_map(|row| {
                row.outcomes[source_index]
                    .value()
                    .map(|v| (row.day.aod_550, v))
            })
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![
            "date".to_string(),
            "lat".to_string(),
            "lon".to_string(),
            "aod_aeronet".to_string(),
        ];
        header.extend(self.products.iter().map(|p| format!("aod_{}", p.name())));
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![
                row.day.date.format("%Y-%m-%d").to_string(),
                row.day.lat.to_string(),
                row.day.lon.to_string(),
                row.day.aod_550.to_string(),
            ];
            record.extend(
                row.outcomes
                    .iter()
                    .map(|o| o.value().map(|v| v.to_string()).unwrap_or_default()),
            );
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: &Path) -> Result<()> {
        info!("Writing matchup table: {}", path.display());
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }
}

/// Match every day against every configured product in parallel
pub fn run_matchup(days: &[DailyMean], config: &MatchupConfig) -> MatchupReport {
    info!(
        "Matching {} days against {} products ({})",
        days.len(),
        config.sources.len(),
        config.neighborhood
    );

    for source in &config.sources {
        if let Some((path, false)) = check_product_crs(source, days) {
            warn!(
                "{} rasters are not in a geographic CRS (checked {}), station coordinates may not line up",
                source.product,
                path.display()
            );
        }
    }

    let rows: Vec<MatchRow> = days
        .par_iter()
        .map(|day| MatchRow {
            day: *day,
            outcomes: config
                .sources
                .iter()
                .map(|source| {
                    match_day(day, source, config.neighborhood, config.default_nodata)
                })
                .collect(),
        })
        .collect();

    let report = MatchupReport {
        products: config.sources.iter().map(|s| s.product).collect(),
        rows,
    };

    for (i, product) in report.products.iter().enumerate() {
        let t = report.tally(i);
        info!(
            "{}: {} matched, {} no data, {} missing rasters, {} out of extent, {} raster errors",
            product, t.matched, t.no_data, t.missing_raster, t.out_of_extent, t.raster_error
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::wgs84_wkt;
    use crate::io::write_geotiff;
    use gdal::spatial_ref::SpatialRef;
    use ndarray::Array2;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day(date: NaiveDate, lat: f64, lon: f64) -> DailyMean {
        DailyMean {
            date,
            aod_550: 0.3,
            lat,
            lon,
        }
    }

    /// Write a 10x10 raster over lon 105..106, lat 21.5..20.5 at the product's path
    fn write_product_raster(source: &ProductSource, date: NaiveDate, value: f32) {
        let path = source.raster_path(date);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let data = Array2::from_elem((10, 10), value);
        let geotransform = [105.0, 0.1, 0.0, 21.5, 0.0, -0.1];
        write_geotiff(&path, &data, &geotransform, &wgs84_wkt().unwrap(), -9999.0).unwrap();
    }

    #[test]
    fn test_file_names() {
        assert_eq!(Product::Viirs.file_name(date(2019, 3, 7)), "20190307.tif");
        assert_eq!(Product::Viirs.file_name(date(2019, 11, 21)), "20191121.tif");
        assert_eq!(
            Product::Maiac.file_name(date(2019, 3, 7)),
            "MAIAC_composite_201903_7.tif"
        );
        assert_eq!(
            Product::Maiac.file_name(date(2019, 11, 21)),
            "MAIAC_composite_201911_21.tif"
        );
    }

    #[test]
    fn test_raster_path_layout() {
        let source = ProductSource::new(Product::Viirs, "VIIRS");
        assert_eq!(
            source.raster_path(date(2018, 1, 2)),
            Path::new("VIIRS/daily average/2018/20180102.tif")
        );
    }

    #[test]
    fn test_missing_raster_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = ProductSource::new(Product::Viirs, dir.path());
        let nb = Neighborhood::square(1).unwrap();
        let outcome = match_day(&day(date(2019, 8, 31), 21.0, 105.8), &source, nb, DEFAULT_NODATA);
        assert!(matches!(outcome, MatchOutcome::Failed(MatchFailure::MissingRaster(_))));
    }

    #[test]
    fn test_maiac_values_are_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let source = ProductSource::new(Product::Maiac, dir.path());
        let d = date(2019, 8, 31);
        write_product_raster(&source, d, 250.0);

        let nb = Neighborhood::square(3).unwrap();
        let outcome = match_day(&day(d, 21.0, 105.5), &source, nb, DEFAULT_NODATA);
        let value = outcome.value().unwrap();
        assert!((value - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_edge_station_is_matched() {
        let dir = tempfile::tempdir().unwrap();
        let source = ProductSource::new(Product::Viirs, dir.path());
        let d = date(2019, 8, 31);
        write_product_raster(&source, d, 0.42);

        // North-west corner pixel; a 5x5 window keeps only its 3x3 in-raster part
        let nb = Neighborhood::square(5).unwrap();
        let outcome = match_day(&day(d, 21.48, 105.02), &source, nb, DEFAULT_NODATA);
        assert!((outcome.value().unwrap() - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_run_matchup_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let viirs = ProductSource::new(Product::Viirs, dir.path().join("VIIRS"));
        let maiac = ProductSource::new(Product::Maiac, dir.path().join("MAIAC"));
        let d1 = date(2019, 8, 31);
        let d2 = date(2019, 9, 1);
        write_product_raster(&viirs, d1, 0.42);
        write_product_raster(&viirs, d2, -9999.0);

        let config = MatchupConfig {
            sources: vec![viirs, maiac],
            neighborhood: Neighborhood::square(1).unwrap(),
            default_nodata: DEFAULT_NODATA,
        };
        let days = vec![
            day(d1, 21.0, 105.5),
            day(d2, 21.0, 105.5),
            // Far outside the raster
            day(d1, 10.0, 100.0),
        ];
        let report = run_matchup(&days, &config);

        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].day.date, d1);
        assert!((report.rows[0].outcomes[0].value().unwrap() - 0.42).abs() < 1e-6);
        assert_eq!(
            report.rows[1].outcomes[0],
            MatchOutcome::NoData(NoDataReason::AllMasked)
        );
        assert!(matches!(
            report.rows[2].outcomes[0],
            MatchOutcome::Failed(MatchFailure::OutOfExtent(_))
        ));

        let viirs_tally = report.tally(0);
        assert_eq!(viirs_tally.matched, 1);
        assert_eq!(viirs_tally.no_data, 1);
        assert_eq!(viirs_tally.out_of_extent, 1);
        assert_eq!(report.tally(1).missing_raster, 3);
        assert_eq!(report.pairs(0).len(), 1);
    }

    #[test]
    fn test_check_product_crs_uses_first_existing_raster() {
        let dir = tempfile::tempdir().unwrap();
        let source = ProductSource::new(Product::Viirs, dir.path());
        let d1 = date(2019, 8, 31);
        let d2 = date(2019, 9, 1);
        let days = vec![day(d1, 21.0, 105.5), day(d2, 21.0, 105.5)];
        assert_eq!(check_product_crs(&source, &days), None);

        write_product_raster(&source, d2, 0.3);
        assert_eq!(
            check_product_crs(&source, &days),
            Some((source.raster_path(d2), true))
        );
    }

    #[test]
    fn test_check_product_crs_flags_projected_rasters() {
        let dir = tempfile::tempdir().unwrap();
        let source = ProductSource::new(Product::Maiac, dir.path());
        let d = date(2019, 8, 31);
        let path = source.raster_path(d);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let utm = SpatialRef::from_epsg(32648).unwrap().to_wkt().unwrap();
        let data = Array2::from_elem((10, 10), 100.0f32);
        write_geotiff(&path, &data, &[500000.0, 500.0, 0.0, 2300000.0, 0.0, -500.0], &utm, -9999.0).unwrap();

        assert_eq!(check_product_crs(&source, &[day(d, 21.0, 105.5)]), Some((path, false)));
    }

    #[test]
    fn test_write_csv_leaves_unmatched_empty() {
        let report = MatchupReport {
            products: vec![Product::Viirs, Product::Maiac],
            rows: vec![MatchRow {
                day: DailyMean {
                    date: date(2019, 8, 31),
                    aod_550: 0.5,
                    lat: 9.28,
                    lon: 105.73,
                },
                outcomes: vec![
                    MatchOutcome::Matched(0.25),
                    MatchOutcome::NoData(NoDataReason::AllMasked),
                ],
            }],
        };

        let mut out = Vec::new();
        report.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "date,lat,lon,aod_aeronet,aod_viirs,aod_maiac\n2019-08-31,9.28,105.73,0.5,0.25,\n"
        );
    }
}
