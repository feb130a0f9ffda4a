use image::{GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::map_colors2;
use imageproc::morphology;
use pick_place_lib::{ColorRange, ObjectFilter};

use crate::HsvImage;

/// Value of a set pixel in every mask produced here.
pub const FOREGROUND: u8 = 255;

/// Sigma matching a 5x5 Gaussian kernel.
const SILHOUETTE_BLUR_SIGMA: f32 = 1.1;

fn binary(set: bool) -> Luma<u8> {
    Luma([if set { FOREGROUND } else { 0 }])
}

/// Pixels of `hsv` inside the inclusive color range.
pub fn in_range(hsv: &HsvImage, range: &ColorRange) -> GrayImage {
    GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| {
        binary(range.contains(hsv.get(x, y)))
    })
}

/// Saturation/value band-pass over the `width` x `height` window at
/// (`x0`, `y0`).
pub fn band_pass(
    hsv: &HsvImage,
    filter: &ObjectFilter,
    x0: u32,
    y0: u32,
    width: u32,
    height: u32,
) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let [_, s, v] = hsv.get(x0 + x, y0 + y);
        binary(filter.saturation.contains(s) && filter.value.contains(v))
    })
}

/// 3x3 open then close: drops speckle, then fills pinholes.
pub fn remove_speckle(mask: &GrayImage) -> GrayImage {
    let opened = morphology::open(mask, Norm::LInf, 1);
    morphology::close(&opened, Norm::LInf, 1)
}

/// Dark-on-light silhouette: Gaussian blur, then inverted binary threshold at
/// the Otsu level. Returns the mask and the level used.
pub fn dark_silhouette(gray: &GrayImage) -> (GrayImage, u8) {
    let blurred = gaussian_blur_f32(gray, SILHOUETTE_BLUR_SIGMA);
    let level = otsu_level(&blurred);
    (threshold(&blurred, level, ThresholdType::BinaryInverted), level)
}

/// Pixel-wise AND of two masks of the same size.
pub fn intersect(a: &GrayImage, b: &GrayImage) -> GrayImage {
    map_colors2(a, b, |p, q| binary(p[0] > 0 && q[0] > 0))
}
