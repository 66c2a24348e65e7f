use crate::sampler::Shape;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aod-matchup")]
#[command(about = "Himawari-8 band extraction and station-centred AOD validation")]
#[command(version)]
pub struct Args {
    /// Number of threads (default: all available)
    #[arg(short, long, global = true, value_name = "N")]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sample a raster around a single station
    Sample(SampleArgs),
    /// Convert Himawari-8 NetCDF bands to clipped WGS84 GeoTIFFs
    Convert(ConvertArgs),
    /// Match AERONET daily means against VIIRS and MAIAC rasters
    Matchup(MatchupArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct NeighborhoodArgs {
    /// Neighbourhood width in pixels (full extent, not a radius)
    #[arg(short, long, default_value_t = 1, value_name = "PIXELS")]
    pub width: usize,

    /// Neighbourhood shape: square or circle
    #[arg(short, long, default_value = "square", value_name = "SHAPE")]
    pub shape: Shape,

    /// No-data value used when the raster declares none
    #[arg(long, default_value_t = -9999.0, allow_hyphen_values = true, value_name = "VALUE")]
    pub nodata: f64,
}

#[derive(ClapArgs, Debug)]
pub struct SampleArgs {
    /// Input GeoTIFF path
    #[arg(short, long, value_name = "FILE")]
    pub raster: PathBuf,

    /// Station latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Station longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    #[command(flatten)]
    pub neighborhood: NeighborhoodArgs,
}

#[derive(ClapArgs, Debug)]
pub struct ConvertArgs {
    /// Himawari-8 NetCDF file
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output directory (default: next to the input)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Comma-separated band variables, e.g. albedo_01,tbb_13 (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub bands: Vec<String>,

    /// Clip window as min_x min_y max_x max_y
    #[arg(
        long,
        num_args = 4,
        value_names = ["MIN_X", "MIN_Y", "MAX_X", "MAX_Y"],
        allow_hyphen_values = true,
        default_values_t = [100.1, 6.1, 111.8, 25.6]
    )]
    pub bounds: Vec<f64>,

    /// Output resolution in degrees
    #[arg(long, default_value_t = 0.05)]
    pub resolution: f64,

    /// gdalwarp resampling method
    #[arg(long, default_value = "near")]
    pub resampling: String,

    /// Skip clipping, keep only the full-disk GeoTIFFs
    #[arg(long)]
    pub no_clip: bool,

    /// No-data value written to output bands
    #[arg(long, default_value_t = -99999.0, allow_hyphen_values = true)]
    pub nodata: f64,
}

#[derive(ClapArgs, Debug)]
pub struct MatchupArgs {
    /// AERONET CSV export
    #[arg(short, long, value_name = "FILE")]
    pub aeronet: PathBuf,

    /// VIIRS root directory (contains "daily average/<year>/")
    #[arg(long, value_name = "DIR")]
    pub viirs_dir: Option<PathBuf>,

    /// MAIAC root directory (contains "daily average/<year>/")
    #[arg(long, value_name = "DIR")]
    pub maiac_dir: Option<PathBuf>,

    /// Output CSV path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    #[command(flatten)]
    pub neighborhood: NeighborhoodArgs,
}
