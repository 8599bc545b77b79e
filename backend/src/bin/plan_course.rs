use std::{fs::File, io::BufWriter, path::PathBuf, sync::Arc};

use course_backend::{
    config::{EngineConfig, RoutingBackend},
    course::{CorrectionProgress, CourseGenerator},
    gpx_export::write_course_gpx,
    location::FixedLocation,
    models::{GeoPoint, TripMode},
    points::PointCalculator,
};
use clap::{Parser, ValueEnum};
use rand::{SeedableRng, rngs::StdRng};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    RoundTrip,
    OneWay,
}

impl From<Mode> for TripMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::RoundTrip => TripMode::RoundTrip,
            Mode::OneWay => TripMode::OneWay,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Plan a running course and print it as JSON")]
struct Args {
    /// Start latitude
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    /// Start longitude
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,
    /// Target course length in metres
    #[arg(long)]
    distance_m: f64,
    #[arg(long, value_enum, default_value_t = Mode::RoundTrip)]
    mode: Mode,
    /// Waypoint as LAT,LNG; repeat for several
    #[arg(long = "waypoint", value_parser = parse_point, allow_hyphen_values = true)]
    waypoints: Vec<GeoPoint>,
    /// Seed for reproducible point placement
    #[arg(long)]
    seed: Option<u64>,
    /// Route along straight legs instead of calling OSRM
    #[arg(long)]
    offline: bool,
    /// Also write the course as GPX
    #[arg(long)]
    gpx: Option<PathBuf>,
}

fn parse_point(s: &str) -> Result<GeoPoint, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {s}"))?;
    let lat = lat.trim().parse().map_err(|_| format!("bad latitude {lat}"))?;
    let lng = lng.trim().parse().map_err(|_| format!("bad longitude {lng}"))?;
    Ok(GeoPoint::new(lat, lng))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = EngineConfig::from_env()?;
    if args.offline {
        config.backend = RoutingBackend::Geodesic;
    }

    let points = PointCalculator::new(config.load_safe_points()?)?;
    let generator = CourseGenerator::new(config.build_router()?, points).with_progress(Arc::new(
        |progress: CorrectionProgress| {
            tracing::info!(
                "attempt {}: {:.0}m routed for {:.0}m ({:.1}% off)",
                progress.attempt + 1,
                progress.actual_m,
                progress.target_m,
                progress.error_ratio * 100.0
            );
        },
    ));

    let mut rng = match args.seed.or(config.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let start = FixedLocation(GeoPoint::new(args.lat, args.lng));
    let course = generator
        .generate_course_from_location(
            &start,
            &mut rng,
            args.mode.into(),
            args.distance_m,
            &args.waypoints,
        )
        .await?;

    if let Some(path) = &args.gpx {
        write_course_gpx(&course, BufWriter::new(File::create(path)?))?;
        tracing::info!("GPX written to {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&course)?);
    Ok(())
}
