//! Shared geometry types for detections, OCR boxes and UI regions.
//!
//! All coordinates are absolute pixels in the analyzed frame.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X position of top-left corner
    pub x: i32,
    /// Y position of top-left corner
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Center of the rectangle.
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width / height. Returns 0.0 for degenerate rectangles.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, (right - x).max(0) as u32, (bottom - y).max(0) as u32)
    }

    /// Vertical overlap as a fraction of the shorter rectangle's height.
    ///
    /// Used by the text-merge pass: two boxes on the same text line overlap
    /// almost fully, boxes on adjacent lines not at all.
    pub fn vertical_overlap_ratio(&self, other: &Rect) -> f32 {
        let top = self.y.max(other.y);
        let bottom = self.bottom().min(other.bottom());
        let overlap = (bottom - top).max(0) as f32;
        let min_height = self.height.min(other.height) as f32;
        if min_height <= 0.0 {
            return 0.0;
        }
        overlap / min_height
    }

    /// Horizontal gap between two rectangles, 0 if they overlap horizontally.
    pub fn horizontal_gap(&self, other: &Rect) -> i32 {
        if self.x <= other.x {
            (other.x - self.right()).max(0)
        } else {
            (self.x - other.right()).max(0)
        }
    }
}

/// Euclidean distance between two points.
pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_and_area() {
        let r = Rect::new(10, 20, 100, 50);
        assert_eq!(r.center(), (60.0, 45.0));
        assert_eq!(r.area(), 5000);
        assert!((r.aspect_ratio() - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_union() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 5, 10, 10);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0, 0, 30, 15));
    }

    #[test]
    fn test_vertical_overlap_same_line() {
        // Two word boxes on the same text line
        let a = Rect::new(0, 100, 40, 20);
        let b = Rect::new(50, 102, 40, 20);
        assert!(a.vertical_overlap_ratio(&b) > 0.8);
    }

    #[test]
    fn test_vertical_overlap_different_lines() {
        let a = Rect::new(0, 100, 40, 20);
        let b = Rect::new(0, 140, 40, 20);
        assert_eq!(a.vertical_overlap_ratio(&b), 0.0);
    }

    #[test]
    fn test_horizontal_gap() {
        let a = Rect::new(0, 0, 40, 20);
        let b = Rect::new(50, 0, 40, 20);
        assert_eq!(a.horizontal_gap(&b), 10);
        assert_eq!(b.horizontal_gap(&a), 10);
        // Overlapping boxes have zero gap
        let c = Rect::new(30, 0, 40, 20);
        assert_eq!(a.horizontal_gap(&c), 0);
    }

    #[test]
    fn test_distance() {
        assert!((distance((0.0, 0.0), (3.0, 4.0)) - 5.0).abs() < 0.001);
    }
}
