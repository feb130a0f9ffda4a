use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use pick_place_lib::{Point2D, ZoneBox};

/// Outer border of one foreground region. `area` is the area enclosed by the
/// border polygon, so a hollow outline counts everything inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub points: Vec<Point<i32>>,
    pub area: f64,
}

impl Blob {
    fn from_points(points: Vec<Point<i32>>) -> Self {
        let area = signed_area(&points).abs();
        Self { points, area }
    }

    /// Upright bounding rectangle of the border, inclusive of edge pixels.
    pub fn bounding_box(&self) -> ZoneBox {
        if self.points.is_empty() {
            return ZoneBox::new(0, 0, 0, 0);
        }
        let mut min = (i32::MAX, i32::MAX);
        let mut max = (i32::MIN, i32::MIN);
        for p in &self.points {
            min = (min.0.min(p.x), min.1.min(p.y));
            max = (max.0.max(p.x), max.1.max(p.y));
        }
        ZoneBox::new(min.0, min.1, max.0 - min.0 + 1, max.1 - min.1 + 1)
    }

    /// Centroid of the enclosed polygon, truncated to pixels. `None` for a
    /// degenerate border with no enclosed area.
    pub fn centroid(&self) -> Option<Point2D> {
        let a = signed_area(&self.points);
        if a == 0.0 {
            return None;
        }

        let (mut cx, mut cy) = (0.0, 0.0);
        for (p, q) in edges(&self.points) {
            let cross = cross(p, q);
            cx += (p.x + q.x) as f64 * cross;
            cy += (p.y + q.y) as f64 * cross;
        }
        let scale = 6.0 * a;
        Some(Point2D::new((cx / scale) as i32, (cy / scale) as i32))
    }
}

fn edges(points: &[Point<i32>]) -> impl Iterator<Item = (Point<i32>, Point<i32>)> + '_ {
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| (*p, *q))
}

fn cross(p: Point<i32>, q: Point<i32>) -> f64 {
    p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64
}

/// Shoelace area, signed by winding order.
fn signed_area(points: &[Point<i32>]) -> f64 {
    edges(points).map(|(p, q)| cross(p, q)).sum::<f64>() / 2.0
}

/// Outer borders of the top-level regions of a mask. Holes and anything
/// nested inside a hole are skipped.
pub fn external_blobs(mask: &GrayImage) -> Vec<Blob> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| Blob::from_points(c.points))
        .collect()
}

/// Largest external blob by enclosed area, if it reaches `min_area`.
pub fn largest_blob(mask: &GrayImage, min_area: u32) -> Option<Blob> {
    external_blobs(mask)
        .into_iter()
        .max_by(|a, b| a.area.total_cmp(&b.area))
        .filter(|blob| blob.area >= min_area as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_with(size: (u32, u32), rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        GrayImage::from_fn(size.0, size.1, |x, y| {
            let set = rects
                .iter()
                .any(|&(rx, ry, w, h)| x >= rx && x < rx + w && y >= ry && y < ry + h);
            Luma([if set { 255 } else { 0 }])
        })
    }

    fn outline(x: u32, y: u32, side: u32, thickness: u32) -> [(u32, u32, u32, u32); 4] {
        [
            (x, y, side, thickness),
            (x, y + side - thickness, side, thickness),
            (x, y, thickness, side),
            (x + side - thickness, y, thickness, side),
        ]
    }

    #[test]
    fn test_square_area_and_box() {
        let mask = mask_with((60, 60), &[(10, 20, 20, 20)]);
        let blob = largest_blob(&mask, 0).expect("blob");

        // Border runs through pixel centers 10..=29
        assert_eq!(blob.area, 361.0);
        assert_eq!(blob.bounding_box(), ZoneBox::new(10, 20, 20, 20));
        assert_eq!(blob.centroid(), Some(Point2D::new(19, 29)));
    }

    #[test]
    fn test_outline_encloses_its_interior() {
        let mask = mask_with((400, 400), &outline(100, 100, 150, 3));
        let blobs = external_blobs(&mask);

        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 149.0 * 149.0);
        assert_eq!(blobs[0].bounding_box(), ZoneBox::new(100, 100, 150, 150));
    }

    #[test]
    fn test_region_inside_hole_is_not_external() {
        let mut rects = outline(10, 10, 80, 4).to_vec();
        rects.push((40, 40, 10, 10));
        let mask = mask_with((100, 100), &rects);

        assert_eq!(external_blobs(&mask).len(), 1);
    }

    #[test]
    fn test_min_area_rejects_largest() {
        let mask = mask_with((100, 100), &[(5, 5, 10, 10), (50, 50, 5, 5)]);
        assert_eq!(largest_blob(&mask, 82), None);
        let blob = largest_blob(&mask, 81).expect("blob");
        assert_eq!(blob.bounding_box(), ZoneBox::new(5, 5, 10, 10));
    }

    #[test]
    fn test_single_pixel_has_no_centroid() {
        let mask = mask_with((10, 10), &[(4, 4, 1, 1)]);
        let blob = largest_blob(&mask, 0).expect("blob");
        assert_eq!(blob.area, 0.0);
        assert_eq!(blob.centroid(), None);
        assert_eq!(blob.bounding_box(), ZoneBox::new(4, 4, 1, 1));
    }

    #[test]
    fn test_empty_mask() {
        let mask = GrayImage::new(20, 20);
        assert!(external_blobs(&mask).is_empty());
        assert_eq!(largest_blob(&mask, 0), None);
    }
}
