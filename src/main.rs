use aod_matchup::aeronet::{daily_means, hourly_means, read_aeronet};
use aod_matchup::cli::{Args, Command, ConvertArgs, MatchupArgs, NeighborhoodArgs, SampleArgs};
use aod_matchup::crs::is_geographic;
use aod_matchup::himawari::{convert_file, BandSelection, ConvertConfig};
use aod_matchup::matchup::{run_matchup, MatchupConfig, Product, ProductSource};
use aod_matchup::stats::ValidationStats;
use aod_matchup::warp::ClipOptions;
use aod_matchup::{read_band, sample, AodError, Neighborhood, Result, Sample};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Set thread pool size if specified
    if let Some(n_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
            .expect("Failed to build thread pool");
        info!("Using {} threads", n_threads);
    }

    match args.command {
        Command::Sample(a) => run_sample(a),
        Command::Convert(a) => run_convert(a),
        Command::Matchup(a) => run_matchup_command(a),
    }
}

fn neighborhood(args: &NeighborhoodArgs) -> Result<Neighborhood> {
    Neighborhood::new(args.shape, args.width)
}

fn run_sample(args: SampleArgs) -> Result<()> {
    let nb = neighborhood(&args.neighborhood)?;
    let (data, metadata) = read_band(&args.raster)?;
    info!("Raster size: {}x{}", metadata.width, metadata.height);

    if !is_geographic(&metadata.projection) {
        warn!("Station coordinates are interpreted in the raster's own CRS");
    }

    let nodata = metadata.nodata.unwrap_or(args.neighborhood.nodata);
    info!("Using nodata value: {}", nodata);

    let geotransform = metadata.geotransform()?;
    match sample(&data.view(), &geotransform, args.lat, args.lon, nb, nodata)? {
        Sample::Value(v) => println!("{}", v),
        Sample::NoData(reason) => {
            info!("No data: {}", reason);
            println!("nodata");
        }
    }
    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    info!("=== Himawari-8 band conversion ===");

    let clip = if args.no_clip {
        None
    } else {
        let bounds: [f64; 4] = args
            .bounds
            .as_slice()
            .try_into()
            .map_err(|_| AodError::InvalidBoundsCount(args.bounds.len()))?;
        Some(ClipOptions {
            bounds,
            resolution: args.resolution,
            resampling: args.resampling,
        })
    };
    let bands = if args.bands.is_empty() {
        BandSelection::All
    } else {
        BandSelection::Named(args.bands)
    };

    let config = ConvertConfig {
        input: args.input,
        output_dir: args.output_dir,
        bands,
        clip,
        nodata: args.nodata,
    };
    let report = convert_file(&config)?;

    if report.failed() > 0 {
        warn!("{} of {} bands failed", report.failed(), report.outcomes.len());
    }
    info!("=== Done! ===");
    Ok(())
}

fn run_matchup_command(args: MatchupArgs) -> Result<()> {
    info!("=== AERONET / satellite AOD matchup ===");
    let nb = neighborhood(&args.neighborhood)?;

    let records = read_aeronet(&args.aeronet)?;
    let hourly = hourly_means(&records);
    let days = daily_means(&hourly);
    info!("{} hourly means, {} daily means", hourly.len(), days.len());

    let mut sources = Vec::new();
    if let Some(dir) = args.viirs_dir {
        sources.push(ProductSource::new(Product::Viirs, dir));
    }
    if let Some(dir) = args.maiac_dir {
        sources.push(ProductSource::new(Product::Maiac, dir));
    }
    if sources.is_empty() {
        warn!("No satellite product directories given, writing AERONET means only");
    }

    let config = MatchupConfig {
        sources,
        neighborhood: nb,
        default_nodata: args.neighborhood.nodata,
    };
    let report = run_matchup(&days, &config);

    for (i, product) in report.products.iter().enumerate() {
        match ValidationStats::from_pairs(&report.pairs(i)) {
            Some(stats) => info!("{} vs AERONET: {}", product, stats),
            None => info!("{} vs AERONET: too few matched days", product),
        }
    }

    report.write_csv_file(&args.output)?;
    info!("=== Done! ===");
    Ok(())
}
