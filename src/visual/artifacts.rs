//! Rendering-artifact checks: tearing, color anomalies, blur/over-sharpening.
//!
//! The three checks are independent and additive; one frame can carry
//! artifacts of several types at once.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::VisualConfig;
use crate::visual::color::pixel_saturation;

/// A detected rendering anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualArtifact {
    /// tearing, color_anomaly, blurriness or oversharpening
    pub artifact_type: String,
    /// Severity in [0, 1]
    pub severity: f32,
    /// Representative location in frame coordinates
    pub location: (i32, i32),
    pub description: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

/// Runs all artifact checks on one frame.
pub fn detect_artifacts(
    image: &RgbImage,
    gray: &GrayImage,
    config: &VisualConfig,
) -> Vec<VisualArtifact> {
    let mut artifacts = Vec::new();
    artifacts.extend(detect_tearing(gray, config));
    artifacts.extend(detect_color_anomaly(image));
    artifacts.extend(detect_sharpness_issue(gray, config));
    artifacts
}

/// Screen tearing shows up as an abrupt discontinuity between adjacent
/// pixel rows. Rows whose mean absolute difference from the next row
/// exceeds the threshold are flagged.
fn detect_tearing(gray: &GrayImage, config: &VisualConfig) -> Vec<VisualArtifact> {
    let (width, height) = gray.dimensions();
    if height < 2 || width == 0 {
        return Vec::new();
    }

    let mut artifacts = Vec::new();
    for y in 0..height - 1 {
        let mut diff_sum: u64 = 0;
        for x in 0..width {
            let a = gray.get_pixel(x, y)[0] as i32;
            let b = gray.get_pixel(x, y + 1)[0] as i32;
            diff_sum += (a - b).unsigned_abs() as u64;
        }
        let mean_diff = diff_sum as f32 / width as f32;
        if mean_diff > config.tearing_threshold * 255.0 {
            let severity = (mean_diff / 255.0).min(1.0);
            artifacts.push(VisualArtifact {
                artifact_type: "tearing".to_string(),
                severity,
                location: (0, y as i32),
                description: format!("Row discontinuity at y={} (mean diff {:.1})", y, mean_diff),
                confidence: severity,
            });
        }
    }
    artifacts
}

/// Flags the region where saturation exceeds twice the frame mean.
/// Severity is the fraction of the frame covered by the anomaly.
fn detect_color_anomaly(image: &RgbImage) -> Vec<VisualArtifact> {
    let (width, height) = image.dimensions();
    let total = (width as u64 * height as u64) as f32;
    if total == 0.0 {
        return Vec::new();
    }

    let mut sat_sum = 0.0f64;
    for pixel in image.pixels() {
        sat_sum += pixel_saturation(pixel) as f64;
    }
    let mean_sat = (sat_sum / total as f64) as f32;
    if mean_sat <= 0.0 {
        return Vec::new();
    }

    let threshold = mean_sat * 2.0;
    let mut count = 0u64;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel_saturation(pixel) > threshold {
            count += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if count == 0 {
        return Vec::new();
    }

    let severity = (count as f32 / total).min(1.0);
    vec![VisualArtifact {
        artifact_type: "color_anomaly".to_string(),
        severity,
        location: (min_x as i32, min_y as i32),
        description: format!(
            "Oversaturated region {}x{} covering {:.1}% of frame",
            max_x - min_x + 1,
            max_y - min_y + 1,
            severity * 100.0
        ),
        confidence: 0.6,
    }]
}

/// Laplacian variance as a sharpness measure. Low variance means blur,
/// extremely high variance means over-sharpening.
fn detect_sharpness_issue(gray: &GrayImage, config: &VisualConfig) -> Vec<VisualArtifact> {
    let sharpness = laplacian_variance(gray);
    let threshold = config.sharpness_threshold;

    if sharpness < threshold {
        let severity = (1.0 - sharpness / threshold).clamp(0.0, 1.0) as f32;
        return vec![VisualArtifact {
            artifact_type: "blurriness".to_string(),
            severity,
            location: (0, 0),
            description: format!("Low sharpness ({:.1} < {:.1})", sharpness, threshold),
            confidence: 0.7,
        }];
    }

    let upper = threshold * 10.0;
    if sharpness > upper {
        let severity = ((sharpness - upper) / upper).min(1.0) as f32;
        return vec![VisualArtifact {
            artifact_type: "oversharpening".to_string(),
            severity,
            location: (0, 0),
            description: format!("Excessive sharpness ({:.1} > {:.1})", sharpness, upper),
            confidence: 0.6,
        }];
    }

    Vec::new()
}

/// Variance of the 4-neighbor Laplacian over interior pixels.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let n = ((width - 2) as u64 * (height - 2) as u64) as f64;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let c = gray.get_pixel(x, y)[0] as f64;
            let lap = 4.0 * c
                - gray.get_pixel(x - 1, y)[0] as f64
                - gray.get_pixel(x + 1, y)[0] as f64
                - gray.get_pixel(x, y - 1)[0] as f64
                - gray.get_pixel(x, y + 1)[0] as f64;
            sum += lap;
            sum_sq += lap * lap;
        }
    }
    let mean = sum / n;
    sum_sq / n - mean * mean
}
