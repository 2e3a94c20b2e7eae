//! Shared geometry and control types for the device boundary.

use serde::{Deserialize, Serialize};

/// A point in device screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Physical screen dimensions of the controlled device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ScreenSize {
    /// Common portrait phone resolution, used when detection fails.
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
        }
    }
}

/// An axis-aligned rectangular region in screen coordinates.
///
/// Bounds are inclusive on both ends so a region can describe the full
/// set of coordinates a sampler is allowed to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl Region {
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            x_min,
            y_min,
            x_max: x_max.max(x_min),
            y_max: y_max.max(y_min),
        }
    }

    /// Check whether a point lies inside the region (inclusive).
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x_min
            && point.x <= self.x_max
            && point.y >= self.y_min
            && point.y <= self.y_max
    }

    /// Geometric center of the region.
    pub fn center(&self) -> Point {
        Point::new(
            self.x_min + (self.x_max - self.x_min) / 2,
            self.y_min + (self.y_max - self.y_min) / 2,
        )
    }
}

/// How the device should be unlocked at the start of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockMethod {
    /// Wake the screen and swipe up; no credential required.
    Swipe,
    /// Wake, swipe, then enter a numeric PIN.
    Pin(String),
}

impl Default for UnlockMethod {
    fn default() -> Self {
        UnlockMethod::Swipe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_contains() {
        let region = Region::new(10, 10, 20, 20);
        assert!(region.contains(Point::new(10, 10)));
        assert!(region.contains(Point::new(20, 20)));
        assert!(region.contains(Point::new(15, 12)));
        assert!(!region.contains(Point::new(9, 15)));
        assert!(!region.contains(Point::new(15, 21)));
    }

    #[test]
    fn test_region_center() {
        let region = Region::new(0, 0, 100, 50);
        assert_eq!(region.center(), Point::new(50, 25));
    }

    #[test]
    fn test_degenerate_region_is_normalized() {
        let region = Region::new(30, 30, 10, 10);
        assert_eq!(region.x_max, 30);
        assert_eq!(region.y_max, 30);
        assert!(region.contains(Point::new(30, 30)));
    }

    #[test]
    fn test_unlock_method_serde_round_trip() {
        let pin = UnlockMethod::Pin("1234".to_string());
        let json = serde_json::to_string(&pin).unwrap();
        let back: UnlockMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(pin, back);

        let swipe: UnlockMethod = serde_json::from_str("\"swipe\"").unwrap();
        assert_eq!(swipe, UnlockMethod::Swipe);
    }
}
