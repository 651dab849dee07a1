use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nalgebra::Point2;
use serde::Serialize;
use swingcam::ball::standard_zone_world;
use swingcam::capture::{RadarSwingTracker, SwingEvent, SwingState, SwingThresholds};
use swingcam::{load_frame, CalibrationArtifact, CalibrationError, SwingcamConfig};

#[cfg(not(feature = "tracing"))]
use log::{info, warn, LevelFilter};
#[cfg(feature = "tracing")]
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "swingcam", version, about = "Golf impact camera calibration tools")]
struct Cli {
    /// Device configuration (JSON). Defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Calibration artifact; overrides `artifact_path` from the config.
    #[arg(short, long, global = true)]
    artifact: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace).
    #[cfg(not(feature = "tracing"))]
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a configuration file with every default filled in.
    InitConfig {
        out: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Solve camera intrinsics from checkerboard images.
    Calibrate {
        /// Interior corners along the board width.
        #[arg(long)]
        cols: u32,
        /// Interior corners along the board height.
        #[arg(long)]
        rows: u32,
        #[arg(long)]
        square_mm: f64,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Solve the camera ground pose from four marked points.
    Extrinsic {
        /// Image points `x,y` (four).
        #[arg(long = "px", value_parser = parse_point, num_args = 4, required = true, allow_hyphen_values = true)]
        image_points: Vec<Point2<f64>>,
        /// Ground points `x,y` in millimetres (four); the standard 12 inch
        /// square around the ball when omitted.
        #[arg(long = "mm", value_parser = parse_point, num_args = 4, allow_hyphen_values = true)]
        world_points: Vec<Point2<f64>>,
        /// Keep the current zone instead of deriving it from the markers.
        #[arg(long)]
        keep_zone: bool,
    },
    /// Locate the resting ball in an image.
    Ball {
        image: PathBuf,
        /// Fit from 3 to 6 clicked edge points `x,y` instead of detecting.
        #[arg(long = "edge", value_parser = parse_point, num_args = 1.., allow_hyphen_values = true)]
        edges: Vec<Point2<f64>>,
    },
    /// Define the hitting zone from four clicked corners (FL, FR, BR, BL).
    Zone {
        #[arg(long = "corner", value_parser = parse_point, num_args = 4, allow_hyphen_values = true)]
        corners: Vec<Point2<f64>>,
        /// Reuse the extrinsic marker points instead.
        #[arg(long, conflicts_with = "corners")]
        from_markers: bool,
    },
    /// Run the swing state machine over recorded radar speeds (mph).
    RadarSim {
        #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        samples: Vec<f64>,
        #[arg(long)]
        approach: Option<f64>,
        #[arg(long)]
        hysteresis: Option<f64>,
    },
    /// Print the stored calibration summary.
    Show,
}

fn parse_point(s: &str) -> Result<Point2<f64>, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("bad coordinate '{v}': {e}"))
    };
    Ok(Point2::new(parse(x)?, parse(y)?))
}

fn to_quad(points: &[Point2<f64>]) -> Result<[Point2<f64>; 4], String> {
    points
        .try_into()
        .map_err(|_| format!("expected 4 points, got {}", points.len()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    #[cfg(not(feature = "tracing"))]
    if let Err(e) = swingcam::init_with_level(cli.log_level) {
        eprintln!("error: logger: {e}");
    }
    #[cfg(feature = "tracing")]
    swingcam::init_tracing(false);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

struct Device {
    artifact_path: PathBuf,
    calibrator: swingcam::GeometricCalibrator,
    zone: swingcam::ZoneMapper,
    locator: swingcam::BallLocator,
}

impl Device {
    fn open(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match &cli.config {
            Some(path) => SwingcamConfig::load_json(path)?,
            None => SwingcamConfig::default(),
        };
        let artifact_path = cli.artifact.clone().unwrap_or_else(|| config.artifact_path.clone());
        let mut device = Self {
            calibrator: config.build_calibrator(),
            zone: config.build_zone(),
            locator: config.build_locator()?,
            artifact_path,
        };
        let artifact = CalibrationArtifact::load_or_default(&device.artifact_path)?;
        artifact.apply(&mut device.calibrator, &mut device.zone, &mut device.locator)?;
        Ok(device)
    }

    fn save(&self) -> Result<CalibrationArtifact, Box<dyn std::error::Error>> {
        let artifact = CalibrationArtifact::capture(&self.calibrator, &self.zone, &self.locator);
        artifact.write_json(&self.artifact_path)?;
        Ok(artifact)
    }
}

#[derive(Serialize)]
struct RadarStep {
    sample: usize,
    speed: f64,
    state: SwingState,
    events: Vec<SwingEvent>,
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip(cli)))]
fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Command::InitConfig { out, force } => {
            if out.exists() && !force {
                return Err(format!("{} exists; pass --force to overwrite", out.display()).into());
            }
            SwingcamConfig::default().write_json(out)?;
            println!("wrote {}", out.display());
        }
        Command::Calibrate {
            cols,
            rows,
            square_mm,
            images,
        } => {
            let mut device = Device::open(&cli)?;
            device
                .calibrator
                .begin_intrinsic_calibration(*cols, *rows, *square_mm)?;
            for (i, path) in images.iter().enumerate() {
                let frame = load_frame(path, i as u64)?;
                match device.calibrator.capture_observation(&frame) {
                    Ok(count) => info!("{}: board found ({count} views)", path.display()),
                    Err(e @ (CalibrationError::CornersNotFound | CalibrationError::InvalidParameters(_))) => {
                        warn!("{}: skipped ({e})", path.display())
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            device.calibrator.finish_intrinsic_calibration()?;
            print!("{}", device.save()?.describe());
        }
        Command::Extrinsic {
            image_points,
            world_points,
            keep_zone,
        } => {
            let mut device = Device::open(&cli)?;
            let image = to_quad(image_points)?;
            let world = if world_points.is_empty() {
                standard_zone_world()
            } else {
                to_quad(world_points)?
            };
            device.calibrator.compute_extrinsic_pose(image, world)?;
            if !keep_zone {
                if let Some(extrinsic) = device.calibrator.extrinsic().cloned() {
                    device.zone.from_extrinsic(&extrinsic)?;
                }
            }
            if let (Some(intr), Some(ext)) = (device.calibrator.intrinsics(), device.calibrator.extrinsic()) {
                match device.locator.apply_calibration(intr, &ext.pose) {
                    Ok(range) => info!("ball radius range {:.1}..{:.1} px", range.min_px, range.max_px),
                    Err(e) => warn!("ball radius range unchanged: {e}"),
                }
            }
            print!("{}", device.save()?.describe());
        }
        Command::Ball { image, edges } => {
            let mut device = Device::open(&cli)?;
            let ball = if edges.is_empty() {
                let frame = load_frame(image, 0)?;
                device.locator.detect_automatic(&frame, None)?
            } else {
                device.locator.fit_from_edge_points(edges)?
            };
            device.save()?;
            println!(
                "ball at ({:.1}, {:.1}) radius {:.1} px, confidence {:.2}",
                ball.center.x, ball.center.y, ball.radius, ball.confidence
            );
        }
        Command::Zone {
            corners,
            from_markers,
        } => {
            let mut device = Device::open(&cli)?;
            if *from_markers {
                let extrinsic = device
                    .calibrator
                    .extrinsic()
                    .cloned()
                    .ok_or("no extrinsic markers stored; run `extrinsic` first")?;
                device.zone.from_extrinsic(&extrinsic)?;
            } else {
                device.zone.from_manual_corners(to_quad(corners)?)?;
            }
            print!("{}", device.save()?.describe());
        }
        Command::RadarSim {
            samples,
            approach,
            hysteresis,
        } => {
            let config = match &cli.config {
                Some(path) => SwingcamConfig::load_json(path)?,
                None => SwingcamConfig::default(),
            };
            let thresholds = SwingThresholds {
                approach_mph: approach.unwrap_or(config.radar.approach_mph),
                hysteresis_mph: hysteresis.unwrap_or(config.radar.hysteresis_mph),
                ..config.radar
            };
            let mut tracker = RadarSwingTracker::new(thresholds);
            let mut impacts = 0;
            for (sample, &speed) in samples.iter().enumerate() {
                let events = tracker.on_sample(speed);
                impacts += events
                    .iter()
                    .filter(|e| matches!(e, SwingEvent::ImpactDetected { .. }))
                    .count();
                let step = RadarStep {
                    sample,
                    speed,
                    state: tracker.state(),
                    events,
                };
                println!("{}", serde_json::to_string(&step)?);
            }
            println!("impacts: {impacts}");
        }
        Command::Show => {
            let path = artifact_path(&cli)?;
            let artifact = CalibrationArtifact::load_or_default(&path)?;
            print!("{}", artifact.describe());
        }
    }
    Ok(())
}

fn artifact_path(cli: &Cli) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(p) = &cli.artifact {
        return Ok(p.clone());
    }
    Ok(match &cli.config {
        Some(path) => SwingcamConfig::load_json(path)?.artifact_path,
        None => SwingcamConfig::default().artifact_path,
    })
}
