//! Himawari-8 NetCDF band extraction.
//!
//! Each selected sub-dataset of a full-disk NetCDF file is written to a WGS84
//! float32 GeoTIFF and optionally clipped to a region of interest. Bands are
//! independent units: a failing band is reported and its siblings still run.

use crate::crs::wgs84_wkt;
use crate::error::{AodError, Result};
use crate::io::{extract_metadata_from_dataset, read_band_f32, write_geotiff};
use crate::warp::{clip_to_bounds, ClipOptions};
use gdal::{Dataset, Metadata};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

pub const HIMAWARI_NODATA: f64 = -99999.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Subdataset {
    /// GDAL open string, e.g. `NETCDF:"file.nc":albedo_01`
    pub name: String,
    pub description: String,
}

impl Subdataset {
    /// Variable name, the part after the last ':'
    pub fn variable(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }
}

/// Parse `SUBDATASET_<n>_NAME=` / `SUBDATASET_<n>_DESC=` metadata entries
pub fn parse_subdatasets(entries: &[String]) -> Vec<Subdataset> {
    let mut subdatasets: Vec<(usize, Subdataset)> = Vec::new();

    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            continue;
        };
        let Some(rest) = key.strip_prefix("SUBDATASET_") else {
            continue;
        };
        let Some((index, kind)) = rest.split_once('_') else {
            continue;
        };
        let Ok(index) = index.parse::<usize>() else {
            continue;
        };

        let pos = match subdatasets.iter().position(|(i, _)| *i == index) {
            Some(pos) => pos,
            None => {
                subdatasets.push((
                    index,
                    Subdataset {
                        name: String::new(),
                        description: String::new(),
                    },
                ));
                subdatasets.len() - 1
            }
        };

        match kind {
            "NAME" => subdatasets[pos].1.name = value.to_string(),
            "DESC" => subdatasets[pos].1.description = value.to_string(),
            _ => {}
        }
    }

    subdatasets.sort_by_key(|(i, _)| *i);
    subdatasets
        .into_iter()
        .map(|(_, s)| s)
        .filter(|s| !s.name.is_empty())
        .collect()
}

/// List the sub-datasets (bands) of a NetCDF file
pub fn list_subdatasets(path: &Path) -> Result<Vec<Subdataset>> {
    let dataset = Dataset::open(path)?;
    let entries = dataset.metadata_domain("SUBDATASETS").unwrap_or_default();
    let subdatasets = parse_subdatasets(&entries);

    if subdatasets.is_empty() {
        return Err(AodError::NoSubdatasets(path.to_path_buf()));
    }
    debug!("Found {} sub-datasets in {}", subdatasets.len(), path.display());
    Ok(subdatasets)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum BandSelection {
    #[default]
    All,
    Named(Vec<String>),
}

impl BandSelection {
    pub fn selects(&self, variable: &str) -> bool {
        match self {
            BandSelection::All => true,
            BandSelection::Named(names) => names.iter().any(|n| n == variable),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub input: PathBuf,
    /// Defaults to the input file's directory
    pub output_dir: Option<PathBuf>,
    pub bands: BandSelection,
    /// Skip clipping when `None`
    pub clip: Option<ClipOptions>,
    pub nodata: f64,
}

impl ConvertConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: None,
            bands: BandSelection::All,
            clip: Some(ClipOptions::default()),
            nodata: HIMAWARI_NODATA,
        }
    }

    fn output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    fn stem(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "himawari".to_string())
    }

    /// `<stem>_<variable>.tif` and `<stem>_<variable>_clipped.tif`
    pub fn output_paths(&self, variable: &str) -> (PathBuf, PathBuf) {
        let dir = self.output_dir();
        let stem = self.stem();
        (
            dir.join(format!("{}_{}.tif", stem, variable)),
            dir.join(format!("{}_{}_clipped.tif", stem, variable)),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BandOutcome {
    Converted {
        variable: String,
        tif: PathBuf,
        clipped: Option<PathBuf>,
    },
    Failed {
        variable: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    pub outcomes: Vec<BandOutcome>,
}

impl ConversionReport {
    pub fn converted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BandOutcome::Converted { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.converted()
    }
}

/// Convert every selected band of a Himawari NetCDF file
pub fn convert_file(config: &ConvertConfig) -> Result<ConversionReport> {
    if let Some(clip) = &config.clip {
        clip.validate()?;
    }

    let subdatasets: Vec<Subdataset> = list_subdatasets(&config.input)?
        .into_iter()
        .filter(|s| config.bands.selects(s.variable()))
        .collect();
    info!(
        "Converting {} bands from {}",
        subdatasets.len(),
        config.input.display()
    );

    let wkt = wgs84_wkt()?;
    let outcomes = subdatasets
        .par_iter()
        .map(|sub| {
            let variable = sub.variable().to_string();
            match convert_band(sub, config, &wkt) {
                Ok((tif, clipped)) => BandOutcome::Converted {
                    variable,
                    tif,
                    clipped,
                },
                Err(e) => {
                    warn!("Band {} failed: {}", variable, e);
                    BandOutcome::Failed {
                        variable,
                        reason: e.to_string(),
                    }
                }
            }
        })
        .collect();

    let report = ConversionReport { outcomes };
    info!(
        "Converted {} bands, {} failed",
        report.converted(),
        report.failed()
    );
    Ok(report)
}

fn convert_band(
    sub: &Subdataset,
    config: &ConvertConfig,
    wkt: &str,
) -> Result<(PathBuf, Option<PathBuf>)> {
    debug!("Reading {}", sub.name);
    let dataset = Dataset::open(Path::new(&sub.name))?;
    let metadata = extract_metadata_from_dataset(&dataset)?;
    let mut data = read_band_f32(&dataset, &metadata)?;

    // Normalise declared fill values and NaN to the output sentinel
    let source_nodata = metadata.nodata;
    let nodata = config.nodata as f32;
    data.mapv_inplace(|v| {
        let is_fill = source_nodata.map_or(false, |nd| v as f64 == nd);
        if v.is_nan() || is_fill {
            nodata
        } else {
            v
        }
    });

    let (tif, clipped) = config.output_paths(sub.variable());
    write_geotiff(&tif, &data, &metadata.geotransform, wkt, config.nodata)?;

    match &config.clip {
        Some(clip) => {
            clip_to_bounds(&tif, &clipped, clip)?;
            Ok((tif, Some(clipped)))
        }
        None => Ok((tif, None)),
    }
}
