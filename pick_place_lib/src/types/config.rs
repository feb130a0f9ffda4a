use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::JointPose;

pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.toml";

/// Complete runtime configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub camera: CameraSettings,
    pub vision: VisionConfig,
    pub arm: ArmEndpointConfig,
    pub controller: ControllerConfig,
    pub visual_push: PushConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    #[serde(default)]
    pub index: u32,
    #[serde(default = "default_frame_width")]
    pub width: u32,
    #[serde(default = "default_frame_height")]
    pub height: u32,
}

/// Inclusive HSV range. Hue uses the 0-179 scale, saturation and value 0-255.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

/// Inclusive single-channel band-pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: u8,
    pub max: u8,
}

/// Saturation/value band-pass separating a colorful object from a neutral
/// arm or background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectFilter {
    pub saturation: Band,
    pub value: Band,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub origin: ColorRange,
    pub target: ColorRange,
    pub tip: ColorRange,
    pub object: ObjectFilter,
    pub min_zone_area: u32,
    pub min_object_area: u32,
    #[serde(default = "default_min_tip_area")]
    pub min_tip_area: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmEndpointConfig {
    /// Host (and optional port) of the arm's HTTP endpoint
    pub ip: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Scripted pick-and-place parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub pose_home: JointPose,
    pub pose_above_origin: JointPose,
    pub pose_pick_origin: JointPose,
    pub pose_above_target: JointPose,
    pub pose_place_target: JointPose,
    pub speed_deg_per_s: f64,
    pub acc_deg_per_s2: f64,
    pub grip_open_rad: f64,
    pub grip_closed_rad: f64,
    #[serde(default)]
    pub grip_speed: f64,
    #[serde(default)]
    pub grip_acc: f64,
    /// Vertical hop applied from measured feedback after the above-zone
    /// poses. Zero disables the hop.
    #[serde(default)]
    pub z_lift_mm: f64,
    #[serde(default = "default_cartesian_speed")]
    pub lift_speed: f64,
    #[serde(default = "default_step_pause_ms")]
    pub step_pause_ms: u64,
}

/// Visual-push servo parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub safe_z: f64,
    /// mm of workspace motion per pixel of image error
    pub gain_xy: f64,
    pub max_step_mm: f64,
    pub align_tolerance_px: f64,
    pub push_steps: u32,
    pub push_step_px: f64,
    #[serde(default = "default_cartesian_speed")]
    pub cartesian_speed: f64,
    #[serde(default = "default_align_max_iterations")]
    pub align_max_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_path")]
    pub path: PathBuf,
}

fn default_frame_width() -> u32 {
    640
}

fn default_frame_height() -> u32 {
    480
}

fn default_min_tip_area() -> u32 {
    50
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_cartesian_speed() -> f64 {
    0.25
}

fn default_step_pause_ms() -> u64 {
    500
}

fn default_align_max_iterations() -> u32 {
    20
}

fn default_telemetry_path() -> PathBuf {
    PathBuf::from("telemetry.log")
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_frame_width(),
            height: default_frame_height(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            path: default_telemetry_path(),
        }
    }
}

impl ColorRange {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }

    fn validate(&self, name: &str) -> Result<()> {
        for c in 0..3 {
            if self.lower[c] > self.upper[c] {
                return Err(eyre::eyre!(
                    "Color range '{}' channel {}: lower {} exceeds upper {}",
                    name,
                    c,
                    self.lower[c],
                    self.upper[c]
                ));
            }
        }
        Ok(())
    }
}

impl Band {
    pub fn contains(&self, value: u8) -> bool {
        value >= self.min && value <= self.max
    }
}

impl ArmEndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ControllerConfig {
    pub fn step_pause(&self) -> Duration {
        Duration::from_millis(self.step_pause_ms)
    }
}

impl Settings {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_toml_str(&content)
            .wrap_err_with(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let vision = &self.vision;
        vision.origin.validate("origin")?;
        vision.target.validate("target")?;
        vision.tip.validate("tip")?;

        for (name, band) in [
            ("saturation", vision.object.saturation),
            ("value", vision.object.value),
        ] {
            if band.min > band.max {
                return Err(eyre::eyre!(
                    "Object {} band is inverted ({} > {})",
                    name,
                    band.min,
                    band.max
                ));
            }
        }

        let push = &self.visual_push;
        if push.gain_xy <= 0.0 {
            return Err(eyre::eyre!("visual_push.gain_xy must be positive"));
        }
        if push.max_step_mm <= 0.0 {
            return Err(eyre::eyre!("visual_push.max_step_mm must be positive"));
        }
        if push.push_step_px <= 0.0 {
            return Err(eyre::eyre!("visual_push.push_step_px must be positive"));
        }
        if push.align_tolerance_px <= 0.0 {
            return Err(eyre::eyre!(
                "visual_push.align_tolerance_px must be positive"
            ));
        }
        if push.push_steps == 0 {
            return Err(eyre::eyre!("visual_push.push_steps must be at least 1"));
        }
        if push.align_max_iterations == 0 {
            return Err(eyre::eyre!(
                "visual_push.align_max_iterations must be at least 1"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[vision]
min_zone_area = 2000
min_object_area = 800

[vision.origin]
lower = [100, 120, 50]
upper = [130, 255, 255]

[vision.target]
lower = [0, 0, 0]
upper = [179, 255, 60]

[vision.tip]
lower = [140, 80, 80]
upper = [170, 255, 255]

[vision.object]
saturation = { min = 60, max = 255 }
value = { min = 40, max = 255 }

[arm]
ip = "192.168.4.1"

[controller]
pose_home = [0.0, 0.0, 90.0, 180.0]
pose_above_origin = [-30.0, 10.0, 70.0, 180.0]
pose_pick_origin = [-30.0, 40.0, 60.0, 180.0]
pose_above_target = [30.0, 10.0, 70.0, 180.0]
pose_place_target = [30.0, 40.0, 60.0, 180.0]
speed_deg_per_s = 10.0
acc_deg_per_s2 = 10.0
grip_open_rad = 1.2
grip_closed_rad = 3.0

[visual_push]
safe_z = 60.0
gain_xy = 0.5
max_step_mm = 15.0
align_tolerance_px = 8.0
push_steps = 6
push_step_px = 20.0
"#;

    #[test]
    fn test_sample_loads_with_documented_defaults() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();

        assert_eq!(settings.controller.step_pause_ms, 500);
        assert_eq!(settings.controller.z_lift_mm, 0.0);
        assert_eq!(settings.controller.lift_speed, 0.25);
        assert_eq!(settings.visual_push.cartesian_speed, 0.25);
        assert_eq!(settings.visual_push.align_max_iterations, 20);
        assert_eq!(settings.vision.min_tip_area, 50);
        assert_eq!(settings.arm.timeout(), Duration::from_secs(5));
        assert_eq!(settings.camera.width, 640);
        assert_eq!(settings.telemetry.path, PathBuf::from("telemetry.log"));
        assert_eq!(
            settings.controller.pose_home,
            JointPose::new(0.0, 0.0, 90.0, 180.0)
        );
    }

    #[test]
    fn test_missing_required_field_fails() {
        let without_gain = SAMPLE.replace("gain_xy = 0.5\n", "");
        let err = Settings::from_toml_str(&without_gain).unwrap_err();
        assert!(format!("{:?}", err).contains("gain_xy"));

        let without_pose = SAMPLE.replace("pose_pick_origin = [-30.0, 40.0, 60.0, 180.0]\n", "");
        assert!(Settings::from_toml_str(&without_pose).is_err());
    }

    #[test]
    fn test_pose_arity_is_enforced() {
        let short_pose = SAMPLE.replace(
            "pose_home = [0.0, 0.0, 90.0, 180.0]",
            "pose_home = [0.0, 0.0, 90.0]",
        );
        assert!(Settings::from_toml_str(&short_pose).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let inverted = SAMPLE.replace("lower = [100, 120, 50]", "lower = [140, 120, 50]");
        assert!(Settings::from_toml_str(&inverted).is_err());

        let zero_steps = SAMPLE.replace("push_steps = 6", "push_steps = 0");
        assert!(Settings::from_toml_str(&zero_steps).is_err());

        let negative_gain = SAMPLE.replace("gain_xy = 0.5", "gain_xy = -0.5");
        assert!(Settings::from_toml_str(&negative_gain).is_err());

        let inverted_band = SAMPLE.replace(
            "saturation = { min = 60, max = 255 }",
            "saturation = { min = 200, max = 100 }",
        );
        assert!(Settings::from_toml_str(&inverted_band).is_err());
    }

    #[test]
    fn test_color_range_contains_is_inclusive() {
        let range = ColorRange::new([100, 120, 50], [130, 255, 255]);
        assert!(range.contains([100, 120, 50]));
        assert!(range.contains([130, 255, 255]));
        assert!(!range.contains([99, 200, 200]));
        assert!(!range.contains([110, 119, 200]));
    }

    #[test]
    fn test_shipped_settings_file_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/settings.toml");
        let settings = Settings::load_from_file(path).unwrap();
        assert_eq!(settings.arm.ip, "192.168.4.1");
        assert_eq!(settings.visual_push.push_steps, 6);
    }
}
