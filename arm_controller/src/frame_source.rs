use eyre::{Result, WrapErr};
use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution},
    Camera,
};
use pick_place_lib::{CameraSettings, Point2D};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zone_detector::ZoneDetector;

use crate::TipTracker;

/// Supplies RGB frames to the control loop. `Ok(None)` means the source is
/// exhausted.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Live capture from a local camera.
pub struct CameraSource {
    camera: Camera,
    frame_counter: u64,
}

impl CameraSource {
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        info!("Initializing camera capture:");
        info!("  Device index: {}", settings.index);
        info!("  Resolution: {}x{}", settings.width, settings.height);

        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(settings.index), requested)
            .map_err(|e| eyre::eyre!("Failed to open camera {}: {}", settings.index, e))?;

        if let Err(e) = camera.set_resolution(Resolution::new(settings.width, settings.height)) {
            warn!("Camera rejected requested resolution: {}", e);
        }
        camera
            .open_stream()
            .map_err(|e| eyre::eyre!("Failed to start camera stream: {}", e))?;

        info!("Camera opened successfully");
        info!("  Camera info: {}", camera.info().human_name());

        Ok(Self {
            camera,
            frame_counter: 0,
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| eyre::eyre!("Failed to capture frame: {}", e))?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| eyre::eyre!("Failed to decode frame: {}", e))?;

        let width = decoded.width();
        let height = decoded.height();
        let image = RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| eyre::eyre!("Decoded frame does not match {}x{}", width, height))?;

        self.frame_counter += 1;
        if self.frame_counter % 100 == 0 {
            info!("Captured {} frames", self.frame_counter);
        }

        Ok(Some(image))
    }
}

/// Number of device indices checked by a camera scan.
pub const CAMERA_SCAN_LIMIT: u32 = 6;

/// Result of trying one camera index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraScan {
    pub index: u32,
    /// Size of the first frame read, when the camera delivered one.
    pub resolution: Option<(u32, u32)>,
    pub error: Option<String>,
}

impl CameraScan {
    pub fn available(&self) -> bool {
        self.resolution.is_some()
    }
}

/// Try indices `0..limit`, grabbing one frame from each. A failing index is
/// recorded and the scan moves on.
pub fn scan_cameras<F>(limit: u32, mut grab: F) -> Vec<CameraScan>
where
    F: FnMut(u32) -> Result<RgbImage>,
{
    (0..limit)
        .map(|index| match grab(index) {
            Ok(frame) => {
                info!("Camera {}: available ({}x{})", index, frame.width(), frame.height());
                CameraScan {
                    index,
                    resolution: Some(frame.dimensions()),
                    error: None,
                }
            }
            Err(e) => {
                info!("Camera {}: not available", index);
                debug!("Camera {} error: {}", index, e);
                CameraScan {
                    index,
                    resolution: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect()
}

/// Open camera `index` with the requested size from `template` and read one
/// frame.
pub fn grab_frame(index: u32, template: &CameraSettings) -> Result<RgbImage> {
    let settings = CameraSettings {
        index,
        ..template.clone()
    };
    CameraSource::open(&settings)?
        .next_frame()?
        .ok_or_else(|| eyre::eyre!("Camera {} returned no frame", index))
}

/// Names of the capture devices the platform backend reports.
pub fn list_devices() -> Result<Vec<String>> {
    let devices = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| eyre::eyre!("Failed to query cameras: {}", e))?;
    Ok(devices
        .iter()
        .map(|info| format!("{} ({})", info.human_name(), info.index()))
        .collect())
}

/// Replays still images from a directory in file-name order.
pub struct DirectorySource {
    files: VecDeque<PathBuf>,
}

impl DirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files = Vec::new();

        for entry in fs::read_dir(dir)
            .wrap_err_with(|| format!("Failed to read frame directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        info!("Replaying {} frames from {}", files.len(), dir.display());
        Ok(Self {
            files: files.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.files.pop_front() else {
            return Ok(None);
        };

        let image = image::open(&path)
            .wrap_err_with(|| format!("Failed to load frame {}", path.display()))?;
        Ok(Some(image.to_rgb8()))
    }
}

/// Re-measures the tip by pulling fresh frames through the detector.
pub struct FrameTipTracker<'a> {
    source: &'a mut dyn FrameSource,
    detector: &'a ZoneDetector,
}

impl<'a> FrameTipTracker<'a> {
    pub fn new(source: &'a mut dyn FrameSource, detector: &'a ZoneDetector) -> Self {
        Self { source, detector }
    }
}

impl TipTracker for FrameTipTracker<'_> {
    fn locate_tip(&mut self) -> Option<Point2D> {
        match self.source.next_frame() {
            Ok(Some(frame)) => self.detector.locate_tip(&frame),
            Ok(None) => None,
            Err(e) => {
                warn!("Frame capture failed during alignment: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use pick_place_lib::{Band, ColorRange, ObjectFilter, VisionConfig};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{}-{}", name, uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn frame_with_tip(u: u32, v: u32) -> RgbImage {
        let mut frame = RgbImage::from_pixel(200, 150, Rgb([255, 255, 255]));
        for y in v - 6..v + 6 {
            for x in u - 6..u + 6 {
                frame.put_pixel(x, y, Rgb([230, 20, 230]));
            }
        }
        frame
    }

    fn detector() -> ZoneDetector {
        ZoneDetector::new(VisionConfig {
            origin: ColorRange::new([110, 150, 150], [130, 255, 255]),
            target: ColorRange::new([0, 0, 0], [179, 255, 60]),
            tip: ColorRange::new([140, 80, 80], [170, 255, 255]),
            object: ObjectFilter {
                saturation: Band { min: 60, max: 255 },
                value: Band { min: 40, max: 230 },
            },
            min_zone_area: 1000,
            min_object_area: 200,
            min_tip_area: 50,
        })
    }

    #[test]
    fn test_directory_source_replays_in_name_order() {
        let dir = temp_dir("frames-order");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 255]))
            .save(dir.join("frame_002.png"))
            .unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.join("frame_001.png"))
            .unwrap();
        fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = DirectorySource::open(&dir).unwrap();
        assert_eq!(source.remaining(), 2);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), &Rgb([255, 0, 0]));
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert!(source.next_frame().unwrap().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = std::env::temp_dir().join(format!("missing-{}", uuid::Uuid::new_v4()));
        assert!(DirectorySource::open(dir).is_err());
    }

    #[test]
    fn test_scan_reports_each_index() {
        let mut tried = Vec::new();
        let scans = scan_cameras(CAMERA_SCAN_LIMIT, |index| {
            tried.push(index);
            match index {
                0 => Ok(RgbImage::new(640, 480)),
                3 => Ok(RgbImage::new(1280, 720)),
                _ => Err(eyre::eyre!("no device at {}", index)),
            }
        });

        assert_eq!(tried, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(scans.len(), 6);
        assert_eq!(scans[0].resolution, Some((640, 480)));
        assert_eq!(scans[3].resolution, Some((1280, 720)));
        let available: Vec<_> = scans.iter().filter(|s| s.available()).map(|s| s.index).collect();
        assert_eq!(available, vec![0, 3]);
        assert_eq!(scans[1].error.as_deref(), Some("no device at 1"));
    }

    #[test]
    fn test_frame_tip_tracker_follows_frames() {
        let dir = temp_dir("frames-tip");
        frame_with_tip(60, 50).save(dir.join("a.png")).unwrap();
        RgbImage::from_pixel(200, 150, Rgb([255, 255, 255]))
            .save(dir.join("b.png"))
            .unwrap();

        let mut source = DirectorySource::open(&dir).unwrap();
        let detector = detector();
        let mut tracker = FrameTipTracker::new(&mut source, &detector);

        let tip = tracker.locate_tip().unwrap();
        assert!((tip.u - 59).abs() <= 1 && (tip.v - 49).abs() <= 1, "{:?}", tip);
        // Blank frame, then exhausted source
        assert_eq!(tracker.locate_tip(), None);
        assert_eq!(tracker.locate_tip(), None);

        fs::remove_dir_all(dir).unwrap();
    }
}
