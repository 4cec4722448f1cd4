//! Structural comparison of two frames.
//!
//! Backs the "compare two screenshots" utility: a cheap pixel-level diff
//! with a changed-region bounding box, not a perceptual metric.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Per-pixel channel delta above which a pixel counts as changed.
const CHANGED_PIXEL_THRESHOLD: u32 = 15;

/// Result of comparing two frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDiff {
    /// False when the two frames have different dimensions; the pixel
    /// statistics are zeroed in that case
    pub same_dimensions: bool,
    /// Mean absolute per-channel difference (0-255)
    pub mean_abs_diff: f32,
    /// Fraction of pixels that changed beyond the per-pixel threshold
    pub changed_fraction: f32,
    /// Bounding box of all changed pixels, if any
    pub changed_region: Option<Rect>,
}

/// Computes a structural diff between two frames.
pub fn compare_frames(a: &RgbImage, b: &RgbImage) -> FrameDiff {
    if a.dimensions() != b.dimensions() {
        return FrameDiff {
            same_dimensions: false,
            mean_abs_diff: 0.0,
            changed_fraction: 0.0,
            changed_region: None,
        };
    }

    let (width, height) = a.dimensions();
    let total = width as u64 * height as u64;
    if total == 0 {
        return FrameDiff {
            same_dimensions: true,
            mean_abs_diff: 0.0,
            changed_fraction: 0.0,
            changed_region: None,
        };
    }

    let mut diff_sum = 0u64;
    let mut changed = 0u64;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);

    for (x, y, pa) in a.enumerate_pixels() {
        let pb = b.get_pixel(x, y);
        let mut pixel_diff = 0u32;
        for c in 0..3 {
            pixel_diff += (pa[c] as i32 - pb[c] as i32).unsigned_abs();
        }
        diff_sum += pixel_diff as u64;
        if pixel_diff / 3 > CHANGED_PIXEL_THRESHOLD {
            changed += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    let changed_region = if changed > 0 {
        Some(Rect::new(
            min_x as i32,
            min_y as i32,
            max_x - min_x + 1,
            max_y - min_y + 1,
        ))
    } else {
        None
    };

    FrameDiff {
        same_dimensions: true,
        mean_abs_diff: diff_sum as f32 / (total * 3) as f32,
        changed_fraction: changed as f32 / total as f32,
        changed_region,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_identical_frames() {
        let img = RgbImage::from_pixel(32, 32, Rgb([50, 60, 70]));
        let diff = compare_frames(&img, &img.clone());
        assert!(diff.same_dimensions);
        assert_eq!(diff.mean_abs_diff, 0.0);
        assert_eq!(diff.changed_fraction, 0.0);
        assert!(diff.changed_region.is_none());
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = RgbImage::new(10, 10);
        let b = RgbImage::new(20, 10);
        let diff = compare_frames(&a, &b);
        assert!(!diff.same_dimensions);
    }

    #[test]
    fn test_changed_region_bounds() {
        let a = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        let mut b = a.clone();
        for y in 10..20 {
            for x in 30..40 {
                b.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let diff = compare_frames(&a, &b);
        assert_eq!(diff.changed_region, Some(Rect::new(30, 10, 10, 10)));
        assert!((diff.changed_fraction - 100.0 / 4096.0).abs() < 0.001);
    }
}
