use arm_controller::{
    apply_pending_keys, grab_frame, list_devices, scan_cameras, CameraSource, CycleOutcome,
    DirectorySource, FrameSource, FrameTipTracker, KeyCommand, ModeArbitrator, MotionGateway,
    RoArmClient, CAMERA_SCAN_LIMIT,
};
use clap::{Parser, ValueEnum};
use eyre::Result;
use pick_place_lib::{
    init_tracing, CameraSettings, ControlMode, JsonlTelemetry, MemoryTelemetry, Settings,
    TelemetrySink, DEFAULT_SETTINGS_PATH,
};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use zone_detector::ZoneDetector;

const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "arm_controller")]
#[command(about = "Vision-guided pick-and-place controller for a desktop arm")]
struct Cli {
    /// Settings file
    #[arg(short, long, env = "ARM_SETTINGS", default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    /// Replay frames from a directory instead of the camera
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Keep telemetry in memory instead of appending to the log file
    #[arg(long)]
    dry_run: bool,

    /// Send the firmware init command before startup homing
    #[arg(long)]
    init: bool,

    /// Initial control mode
    #[arg(long, value_enum, default_value_t = ModeArg::Scripted)]
    mode: ModeArg,

    /// Check camera indices 0-5, report which ones deliver frames, and exit
    #[arg(long)]
    list_cameras: bool,

    /// With --list-cameras, save one PNG per working camera here
    #[arg(long, requires = "list_cameras")]
    snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Scripted,
    VisualPush,
}

impl From<ModeArg> for ControlMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Scripted => ControlMode::Scripted,
            ModeArg::VisualPush => ControlMode::VisualPush,
        }
    }
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    if cli.list_cameras {
        return list_cameras(&cli);
    }

    info!("Starting arm controller");

    let settings = Settings::load_from_file(&cli.config)?;
    info!("Loaded settings from {}", cli.config.display());
    info!("  Arm endpoint: {}", settings.arm.ip);
    info!(
        "  Z-lift: {} mm, step pause: {} ms",
        settings.controller.z_lift_mm, settings.controller.step_pause_ms
    );
    info!(
        "  Visual push: safe_z={} gain={} max_step={} tol={}px steps={}x{}px",
        settings.visual_push.safe_z,
        settings.visual_push.gain_xy,
        settings.visual_push.max_step_mm,
        settings.visual_push.align_tolerance_px,
        settings.visual_push.push_steps,
        settings.visual_push.push_step_px
    );

    let arm = Arc::new(RoArmClient::new(&settings.arm)?);

    let telemetry: Arc<dyn TelemetrySink> = if cli.dry_run {
        info!("Dry run: telemetry kept in memory");
        Arc::new(MemoryTelemetry::new())
    } else {
        info!("Telemetry log: {}", settings.telemetry.path.display());
        Arc::new(JsonlTelemetry::open(&settings.telemetry.path)?)
    };

    if cli.init {
        info!("Sending init command to {}", arm.endpoint());
        if let Err(e) = arm.initialize() {
            warn!("Init command failed: {}", e);
        }
    }

    let arbitrator = ModeArbitrator::new(
        arm,
        settings.controller.clone(),
        settings.visual_push.clone(),
        cli.mode.into(),
        telemetry,
    );

    if !arbitrator.startup() {
        warn!("Running in detection-only mode");
    }

    let detector = ZoneDetector::new(settings.vision.clone());
    let mut source: Box<dyn FrameSource> = match &cli.frames {
        Some(dir) => Box::new(DirectorySource::open(dir)?),
        None => Box::new(CameraSource::open(&settings.camera)?),
    };

    let keys = arm_controller::spawn_stdin_listener();
    info!("Keys: m = toggle mode, h = home, q = quit (Enter after each)");
    info!("Control mode: {}", arbitrator.state().mode());

    run_loop(&arbitrator, &detector, source.as_mut(), &keys);

    info!("Arm controller shutting down");
    Ok(())
}

fn list_cameras(cli: &Cli) -> Result<()> {
    let camera = match Settings::load_from_file(&cli.config) {
        Ok(settings) => settings.camera,
        Err(e) => {
            debug!("Using default camera size: {}", e);
            CameraSettings::default()
        }
    };

    match list_devices() {
        Ok(devices) if devices.is_empty() => info!("Backend reports no capture devices"),
        Ok(devices) => {
            for device in devices {
                info!("Device: {}", device);
            }
        }
        Err(e) => warn!("{}", e),
    }

    if let Some(dir) = &cli.snapshot_dir {
        fs::create_dir_all(dir)?;
    }

    info!("Scanning camera indices 0-{}", CAMERA_SCAN_LIMIT - 1);
    let scans = scan_cameras(CAMERA_SCAN_LIMIT, |index| {
        let frame = grab_frame(index, &camera)?;
        if let Some(dir) = &cli.snapshot_dir {
            let path = dir.join(format!("camera_{}.png", index));
            match frame.save(&path) {
                Ok(()) => info!("Saved snapshot {}", path.display()),
                Err(e) => warn!("Failed to save {}: {}", path.display(), e),
            }
        }
        Ok(frame)
    });

    let available = scans.iter().filter(|scan| scan.available()).count();
    info!("{} of {} camera indices available", available, scans.len());
    Ok(())
}

fn run_loop<G: MotionGateway>(
    arbitrator: &ModeArbitrator<G>,
    detector: &ZoneDetector,
    source: &mut dyn FrameSource,
    keys: &Receiver<KeyCommand>,
) {
    let mut frame_count: u64 = 0;

    loop {
        if !apply_pending_keys(arbitrator, keys) {
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Frame source exhausted after {} frames", frame_count);
                break;
            }
            Err(e) => {
                error!("Frame capture failed: {}", e);
                thread::sleep(CAPTURE_RETRY_DELAY);
                continue;
            }
        };
        frame_count += 1;

        let detections = detector.analyze(&frame);
        let mut tracker = FrameTipTracker::new(&mut *source, detector);

        match arbitrator.on_frame(&detections, &mut tracker) {
            CycleOutcome::Completed(mode) => info!("{} routine finished", mode),
            CycleOutcome::Abandoned(mode) => warn!("{} routine abandoned", mode),
            CycleOutcome::Failed(mode) => warn!("{} routine failed, back to idle", mode),
            outcome => debug!("Frame {}: {:?}", frame_count, outcome),
        }
    }
}
