use serde::{Deserialize, Serialize};

/// Pixel coordinate in the camera image (u to the right, v down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point2D {
    pub u: i32,
    pub v: i32,
}

impl Point2D {
    pub fn new(u: i32, v: i32) -> Self {
        Self { u, v }
    }

    /// Pixel delta `other - self` as floating point components.
    pub fn delta_to(&self, other: &Point2D) -> (f64, f64) {
        ((other.u - self.u) as f64, (other.v - self.v) as f64)
    }
}

/// Axis-aligned rectangle in pixel space, top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl ZoneBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Get center coordinates (integer pixel division).
    pub fn center(&self) -> Point2D {
        Point2D::new(self.x + self.w / 2, self.y + self.h / 2)
    }
}
