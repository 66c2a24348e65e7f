//! AERONET ground-station AOD: CSV loading, 550 nm interpolation and
//! hourly/daily averaging.

use crate::error::{AodError, Result};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::{debug, info};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Missing-value marker used in AERONET exports
pub const AERONET_MISSING: f64 = -999.0;

const HEADER_PREFIX: &str = "Date(dd:mm:yyyy)";
const DATETIME_FORMAT: &str = "%d:%m:%Y %H:%M:%S";

#[derive(Debug, Deserialize)]
struct RawAeronetRow {
    #[serde(rename = "Date(dd:mm:yyyy)")]
    date: String,
    #[serde(rename = "Time(hh:mm:ss)")]
    time: String,
    #[serde(rename = "AOD_500nm", deserialize_with = "csv::invalid_option")]
    aod_500: Option<f64>,
    #[serde(
        rename = "440-675_Angstrom_Exponent",
        deserialize_with = "csv::invalid_option"
    )]
    angstrom: Option<f64>,
    #[serde(rename = "Site_Latitude(Degrees)", deserialize_with = "csv::invalid_option")]
    lat: Option<f64>,
    #[serde(rename = "Site_Longitude(Degrees)", deserialize_with = "csv::invalid_option")]
    lon: Option<f64>,
}

/// One AERONET observation with AOD interpolated to 550 nm.
///
/// Site coordinates are `None` when the row leaves them missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AeronetRecord {
    pub time: NaiveDateTime,
    pub aod_550: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Coordinates are averaged over the records that carry them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyMean {
    pub date: NaiveDate,
    pub hour: u32,
    pub aod_550: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyMean {
    pub date: NaiveDate,
    pub aod_550: f64,
    pub lat: f64,
    pub lon: f64,
}

/// Interpolate AOD at 550 nm from 500 nm with the Angstrom exponent
pub fn interpolate_550(aod_500: f64, angstrom: f64) -> f64 {
    aod_500 * (500.0f64 / 550.0).powf(angstrom)
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != AERONET_MISSING)
}

/// Parse AERONET CSV text. Preamble lines before the `Date(dd:mm:yyyy)`
/// header are skipped, and rows with a missing AOD or exponent are dropped.
/// A missing site coordinate keeps the row.
pub fn parse_aeronet(mut reader: impl Read) -> Result<Vec<AeronetRecord>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let start = text
        .match_indices(HEADER_PREFIX)
        .map(|(i, _)| i)
        .find(|&i| i == 0 || text[..i].ends_with('\n'))
        .unwrap_or(0);

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text[start..].as_bytes());

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (i, result) in csv_reader.deserialize().enumerate() {
        let row: RawAeronetRow = result?;
        let line = i as u64 + 1;

        let stamp = format!("{} {}", row.date, row.time);
        let time = NaiveDateTime::parse_from_str(&stamp, DATETIME_FORMAT).map_err(|e| {
            AodError::InvalidAeronetRow {
                line,
                reason: format!("bad timestamp '{}': {}", stamp, e),
            }
        })?;

        match (present(row.aod_500), present(row.angstrom)) {
            (Some(aod_500), Some(angstrom)) => {
                let (lat, lon) = (present(row.lat), present(row.lon));
                if lat.is_none() || lon.is_none() {
                    debug!("Row {} has no site coordinate", line);
                }
                records.push(AeronetRecord {
                    time,
                    aod_550: interpolate_550(aod_500, angstrom),
                    lat,
                    lon,
                });
            }
            _ => {
                debug!("Skipping row {} with missing values", line);
                skipped += 1;
            }
        }
    }

    info!(
        "Loaded {} AERONET records ({} skipped with missing values)",
        records.len(),
        skipped
    );
    Ok(records)
}

pub fn read_aeronet(path: &Path) -> Result<Vec<AeronetRecord>> {
    info!("Reading AERONET data: {}", path.display());
    let file = std::fs::File::open(path)?;
    parse_aeronet(file)
}

/// Running mean that ignores missing values
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn get(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    aod: Mean,
    lat: Mean,
    lon: Mean,
}

impl Accumulator {
    fn add(&mut self, aod: f64, lat: Option<f64>, lon: Option<f64>) {
        self.aod.add(Some(aod));
        self.lat.add(lat);
        self.lon.add(lon);
    }
}

/// Average records per (date, hour), sorted by time
pub fn hourly_means(records: &[AeronetRecord]) -> Vec<HourlyMean> {
    let mut groups: BTreeMap<(NaiveDate, u32), Accumulator> = BTreeMap::new();
    for r in records {
        groups
            .entry((r.time.date(), r.time.hour()))
            .or_default()
            .add(r.aod_550, r.lat, r.lon);
    }

    groups
        .into_iter()
        .filter_map(|((date, hour), acc)| {
            Some(HourlyMean {
                date,
                hour,
                aod_550: acc.aod.get()?,
                lat: acc.lat.get(),
                lon: acc.lon.get(),
            })
        })
        .collect()
}

/// Average hourly means per date, so every hour weighs the same.
///
/// A day needs a site coordinate to be matched, so dates where no hour
/// carries one are dropped.
pub fn daily_means(hourly: &[HourlyMean]) -> Vec<DailyMean> {
    let mut groups: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();
    for h in hourly {
        groups.entry(h.date).or_default().add(h.aod_550, h.lat, h.lon);
    }

    let mut unlocated = 0usize;
    let days: Vec<DailyMean> = groups
        .into_iter()
        .filter_map(|(date, acc)| match (acc.aod.get(), acc.lat.get(), acc.lon.get()) {
            (Some(aod_550), Some(lat), Some(lon)) => Some(DailyMean {
                date,
                aod_550,
                lat,
                lon,
            }),
            _ => {
                debug!("Dropping {}: no site coordinate", date);
                unlocated += 1;
                None
            }
        })
        .collect();

    if unlocated > 0 {
        info!("Dropped {} days without a site coordinate", unlocated);
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
AERONET Version 3; Level 1.5
Site: Bac_Lieu
Date(dd:mm:yyyy),Time(hh:mm:ss),Day_of_Year,AOD_500nm,440-675_Angstrom_Exponent,Site_Latitude(Degrees),Site_Longitude(Degrees)
31:08:2019,01:10:00,243,0.500000,0.000000,9.280,105.730
31:08:2019,01:40:00,243,0.300000,0.000000,9.280,105.730
31:08:2019,03:05:00,243,0.800000,0.000000,9.280,105.730
31:08:2019,04:00:00,243,-999.000000,1.2,9.280,105.730
01:09:2019,02:00:00,244,0.200000,-999,9.280,105.730
01:09:2019,02:30:00,244,0.400000,1.000000,9.280,105.730
";

    #[test]
    fn test_interpolation_identity_for_zero_exponent() {
        assert_eq!(interpolate_550(0.42, 0.0), 0.42);
    }

    #[test]
    fn test_interpolation_reduces_aod_for_positive_exponent() {
        let aod = interpolate_550(0.4, 1.0);
        assert!((aod - 0.4 * 500.0 / 550.0).abs() < 1e-12);
        // Same as dividing by e^(-alpha * ln(0.5 / 0.55))
        let reference = 0.4 / (-1.0f64 * (0.5f64 / 0.55).ln()).exp();
        assert!((aod - reference).abs() < 1e-12);
    }

    #[test]
    fn test_parse_skips_preamble_and_missing() {
        let records = parse_aeronet(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(
            records[0].time,
            NaiveDate::from_ymd_opt(2019, 8, 31)
                .unwrap()
                .and_hms_opt(1, 10, 0)
                .unwrap()
        );
        assert!((records[0].aod_550 - 0.5).abs() < 1e-12);
        assert!((records[0].lat.unwrap() - 9.28).abs() < 1e-12);
        assert!((records[0].lon.unwrap() - 105.73).abs() < 1e-12);
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let text = "\
Date(dd:mm:yyyy),Time(hh:mm:ss),AOD_500nm,440-675_Angstrom_Exponent,Site_Latitude(Degrees),Site_Longitude(Degrees)
2019-08-31,01:10:00,0.5,1.0,9.28,105.73
";
        let err = parse_aeronet(text.as_bytes()).unwrap_err();
        assert!(matches!(err, AodError::InvalidAeronetRow { line: 1, .. }));
    }

    #[test]
    fn test_daily_mean_is_mean_of_hourly_means() {
        let records = parse_aeronet(SAMPLE.as_bytes()).unwrap();
        let hourly = hourly_means(&records);
        assert_eq!(hourly.len(), 3);
        assert_eq!(hourly[0].hour, 1);
        assert!((hourly[0].aod_550 - 0.4).abs() < 1e-12);

        let daily = daily_means(&hourly);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2019, 8, 31).unwrap());
        // Hour 1 mean 0.4, hour 3 mean 0.8
        assert!((daily[0].aod_550 - 0.6).abs() < 1e-12);
        assert!((daily[1].aod_550 - 0.4 * 500.0 / 550.0).abs() < 1e-12);
        assert!((daily[1].lat - 9.28).abs() < 1e-12);
    }

    #[test]
    fn test_missing_coordinates_keep_aod() {
        let text = "\
Date(dd:mm:yyyy),Time(hh:mm:ss),AOD_500nm,440-675_Angstrom_Exponent,Site_Latitude(Degrees),Site_Longitude(Degrees)
31:08:2019,01:10:00,0.5,0.0,-999,105.73
31:08:2019,01:40:00,0.3,0.0,9.28,-999
31:08:2019,01:50:00,0.1,0.0,9.30,105.75
01:09:2019,02:00:00,0.2,0.0,-999,-999
";
        let records = parse_aeronet(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].lat, None);
        assert_eq!(records[1].lon, None);

        let hourly = hourly_means(&records);
        assert_eq!(hourly.len(), 2);
        // All three rows count towards the AOD, coordinates only where present
        assert!((hourly[0].aod_550 - 0.3).abs() < 1e-12);
        assert!((hourly[0].lat.unwrap() - 9.29).abs() < 1e-12);
        assert!((hourly[0].lon.unwrap() - 105.74).abs() < 1e-12);
        assert_eq!(hourly[1].lat, None);

        let daily = daily_means(&hourly);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2019, 8, 31).unwrap());
        assert!((daily[0].aod_550 - 0.3).abs() < 1e-12);
    }
}
