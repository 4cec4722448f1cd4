//! Frame preprocessing shared by the visual analyzer and text recognizer.
//!
//! A pure transform: grayscale conversion plus independently toggleable
//! denoise, contrast-enhancement, binarization and deskew steps. Any step
//! that cannot be applied degrades to the plain grayscale image rather than
//! blocking downstream analysis.

use image::{GrayImage, RgbImage};
use imageproc::contrast::{adaptive_threshold, equalize_histogram};
use imageproc::filter::median_filter;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;

use crate::config::PreprocessConfig;

/// Foreground-point count below which the skew estimate is unreliable.
const MIN_DESKEW_POINTS: usize = 10;

/// Converts a frame to grayscale and applies the configured cleanup steps.
pub fn preprocess(image: &RgbImage, config: &PreprocessConfig) -> GrayImage {
    let mut gray = image::imageops::grayscale(image);

    if config.denoise {
        gray = median_filter(&gray, config.denoise_radius, config.denoise_radius);
    }
    if config.enhance_contrast {
        gray = equalize_histogram(&gray);
    }
    if config.adaptive_threshold {
        gray = adaptive_threshold(&gray, config.threshold_block_radius);
    }
    if config.deskew {
        gray = deskew(&gray);
    }

    gray
}

/// Estimates the dominant content angle from foreground pixels and rotates
/// to correct it. Returns the input unchanged when there are too few
/// foreground points to trust the estimate.
fn deskew(gray: &GrayImage) -> GrayImage {
    let points: Vec<Point<i32>> = gray
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 127)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect();

    if points.len() < MIN_DESKEW_POINTS {
        log::debug!(
            "Deskew skipped: only {} foreground points (need {})",
            points.len(),
            MIN_DESKEW_POINTS
        );
        return gray.clone();
    }

    let angle = estimate_skew_angle(&min_area_rect(&points));
    if angle.abs() < 0.5 {
        return gray.clone();
    }

    log::debug!("Deskewing by {:.2} degrees", -angle);
    rotate_about_center(
        gray,
        -angle.to_radians(),
        Interpolation::Bilinear,
        image::Luma([0u8]),
    )
}

/// Angle in degrees of the longer edge of a minimum-area rectangle,
/// normalized to (-45, 45].
fn estimate_skew_angle(corners: &[Point<i32>; 4]) -> f32 {
    let edge_a = (
        (corners[1].x - corners[0].x) as f32,
        (corners[1].y - corners[0].y) as f32,
    );
    let edge_b = (
        (corners[2].x - corners[1].x) as f32,
        (corners[2].y - corners[1].y) as f32,
    );

    let len_a = edge_a.0 * edge_a.0 + edge_a.1 * edge_a.1;
    let len_b = edge_b.0 * edge_b.0 + edge_b.1 * edge_b.1;
    let longer = if len_a >= len_b { edge_a } else { edge_b };

    let mut angle = longer.1.atan2(longer.0).to_degrees();
    while angle > 45.0 {
        angle -= 90.0;
    }
    while angle <= -45.0 {
        angle += 90.0;
    }
    angle
}
