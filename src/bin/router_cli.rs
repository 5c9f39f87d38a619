//! Command line front end for the isochrone router.
//!
//! Routes between two points under a uniform wind and current, optionally
//! avoiding a land mask, and prints the Pareto front of routes found.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use clap::Parser;
use sail_routing::engine::config::{RoutingRequest, SearchConfig};
use sail_routing::engine::environment::UniformField;
use sail_routing::engine::error::RoutingError;
use sail_routing::engine::mask::LandMask;
use sail_routing::engine::models::{Coordinate, CurrentData, WindData};
use sail_routing::engine::route::Route;
use sail_routing::engine::router::{CancellationToken, IsochroneRouter};
use sail_routing::parsers::polars::PolarTable;

/// Multi-criteria sailing route planner
#[derive(Parser, Debug)]
#[command(author, version, about, allow_negative_numbers = true)]
struct Args {
    #[arg(long, default_value_t = 48.0)]
    start_lat: f64,
    #[arg(long, default_value_t = -5.0)]
    start_lon: f64,
    #[arg(long, default_value_t = 47.0)]
    dest_lat: f64,
    #[arg(long, default_value_t = -6.0)]
    dest_lon: f64,

    /// Departure time, RFC 3339 (default: now)
    #[arg(long)]
    departure: Option<DateTime<Utc>>,

    /// True wind speed in knots
    #[arg(long, default_value_t = 15.0)]
    wind_speed: f64,

    /// Direction the wind blows from, degrees
    #[arg(long, default_value_t = 0.0)]
    wind_from: f64,

    /// Current East component, m/s
    #[arg(long, default_value_t = 0.0)]
    current_u: f64,

    /// Current North component, m/s
    #[arg(long, default_value_t = 0.0)]
    current_v: f64,

    /// Polar CSV (twa/tws header)
    #[arg(long, default_value = "data/cruiser_40.csv")]
    polar: PathBuf,

    /// JSON search configuration; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// xz-compressed land mask bitmap
    #[arg(long)]
    land_mask: Option<PathBuf>,

    /// Isochrone step in seconds
    #[arg(long, default_value_t = 3600.0)]
    step: f64,

    /// Heading resolution in degrees
    #[arg(long, default_value_t = 5.0)]
    resolution: f64,

    #[arg(long, default_value_t = 336)]
    max_steps: u32,

    /// Arrival radius in meters
    #[arg(long, default_value_t = 1852.0)]
    tolerance: f64,

    /// Print the routes as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn print_summary(routes: &[Route]) {
    for (i, route) in routes.iter().enumerate() {
        let c = &route.criteria;
        println!(
            "Route {}: {:.1}h, {:.1} NM, risk {:.3}, {} legs, {} maneuvers",
            i + 1,
            c.elapsed / 3600.0,
            c.distance / 1852.0,
            c.risk,
            route.legs(),
            route.maneuvers()
        );
        if let Some(arrival) = route.arrival() {
            println!(
                "  arrives {} at Lat: {:.4}, Lon: {:.4}",
                arrival.time, arrival.position.lat, arrival.position.lon
            );
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let polar = PolarTable::load_from_csv(&args.polar)?;
    let config: SearchConfig = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => SearchConfig::default(),
    };
    let land_mask = match &args.land_mask {
        Some(path) => LandMask::load_from(path)?,
        None => LandMask::new(),
    };

    let mut request = RoutingRequest::new(
        Coordinate::new(args.start_lat, args.start_lon),
        Coordinate::new(args.dest_lat, args.dest_lon),
        args.departure.unwrap_or_else(Utc::now),
    );
    request.time_step_secs = args.step;
    request.heading_resolution_deg = args.resolution;
    request.max_steps = args.max_steps;
    request.tolerance_m = args.tolerance;

    let field = UniformField::new(
        WindData::from_knots(args.wind_speed, args.wind_from),
        CurrentData { u: args.current_u, v: args.current_v },
    );

    let router = IsochroneRouter::new(request, config, &polar)?.with_land_mask(&land_mask);
    let started = Instant::now();
    let outcome = router.run(&field, &CancellationToken::new());
    let elapsed = started.elapsed();

    match outcome {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result.routes)?);
            } else {
                println!(
                    "{} routes after {} steps ({} points explored) in {:?}",
                    result.routes.len(),
                    result.steps,
                    result.history.len(),
                    elapsed
                );
                print_summary(&result.routes);
            }
            Ok(())
        }
        Err(RoutingError::DestinationUnreachable { steps }) => {
            println!("Destination not reached after {} steps", steps);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
