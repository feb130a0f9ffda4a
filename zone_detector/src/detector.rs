use image::{imageops, RgbImage};
use pick_place_lib::{ColorRange, FrameDetections, ObjectFilter, Point2D, VisionConfig, ZoneBox};
use tracing::debug;

use crate::{
    band_pass, dark_silhouette, in_range, intersect, largest_blob, remove_speckle, HsvImage,
};

/// Bounding box of the color range's largest external contour, ranked by
/// enclosed area.
pub fn detect_zone(hsv: &HsvImage, range: &ColorRange, min_area: u32) -> Option<ZoneBox> {
    let mask = in_range(hsv, range);
    largest_blob(&mask, min_area).map(|blob| blob.bounding_box())
}

/// Center of the largest region of the color range, after a 3x3 open/close
/// to drop speckle.
pub fn detect_point(hsv: &HsvImage, range: &ColorRange, min_area: u32) -> Option<Point2D> {
    let mask = remove_speckle(&in_range(hsv, range));
    largest_blob(&mask, min_area)?.centroid()
}

/// Center of the largest object inside `zone`.
///
/// A pixel belongs to the object only when it is part of the dark silhouette
/// (blurred grayscale, inverted Otsu threshold) AND its saturation and value
/// fall inside the band-pass. The result is in frame coordinates.
pub fn detect_object_in_zone(
    frame: &RgbImage,
    hsv: &HsvImage,
    zone: &ZoneBox,
    filter: &ObjectFilter,
    min_area: u32,
) -> Option<Point2D> {
    let x0 = zone.x.max(0) as u32;
    let y0 = zone.y.max(0) as u32;
    let x1 = ((zone.x + zone.w).max(0) as u32).min(frame.width());
    let y1 = ((zone.y + zone.h).max(0) as u32).min(frame.height());
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    let (w, h) = (x1 - x0, y1 - y0);

    let roi = imageops::crop_imm(frame, x0, y0, w, h).to_image();
    let (silhouette, level) = dark_silhouette(&imageops::grayscale(&roi));
    let colorful = band_pass(hsv, filter, x0, y0, w, h);

    let blob = largest_blob(&intersect(&silhouette, &colorful), min_area)?;
    let local = blob.centroid()?;
    debug!(
        "Object contour: area={} otsu={} local=({}, {})",
        blob.area, level, local.u, local.v
    );

    Some(Point2D::new(local.u + x0 as i32, local.v + y0 as i32))
}

/// Runs every detector over a frame with a fixed configuration.
#[derive(Debug, Clone)]
pub struct ZoneDetector {
    config: VisionConfig,
}

impl ZoneDetector {
    pub fn new(config: VisionConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, frame: &RgbImage) -> FrameDetections {
        let hsv = HsvImage::from_rgb(frame);
        let cfg = &self.config;

        let origin = detect_zone(&hsv, &cfg.origin, cfg.min_zone_area);
        let target = detect_zone(&hsv, &cfg.target, cfg.min_zone_area);
        let object = origin.as_ref().and_then(|zone| {
            detect_object_in_zone(frame, &hsv, zone, &cfg.object, cfg.min_object_area)
        });
        let tip = detect_point(&hsv, &cfg.tip, cfg.min_tip_area);

        FrameDetections {
            origin,
            target,
            object,
            tip,
        }
    }

    /// Tip marker only, for re-measuring during alignment.
    pub fn locate_tip(&self, frame: &RgbImage) -> Option<Point2D> {
        let hsv = HsvImage::from_rgb(frame);
        detect_point(&hsv, &self.config.tip, self.config.min_tip_area)
    }
}
