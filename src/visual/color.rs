//! Color and brightness statistics for one frame.
//!
//! Dominant colors come from a small k-means pass over sampled pixels;
//! brightness statistics use the L* channel of Lab so they track perceived
//! lightness rather than raw channel values.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Number of dominant colors extracted per frame.
const KMEANS_CLUSTERS: usize = 5;
/// Fixed iteration budget for the k-means pass.
const KMEANS_ITERATIONS: usize = 10;
/// Upper bound on pixels sampled for clustering.
const KMEANS_MAX_SAMPLES: usize = 10_000;

/// Aggregate color statistics for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorAnalysis {
    /// Cluster centers of the most common colors, RGB
    pub dominant_colors: Vec<[u8; 3]>,
    /// Mean of the Lab L* channel (0-100)
    pub brightness_mean: f32,
    /// Standard deviation of the Lab L* channel
    pub brightness_std: f32,
    /// Mean HSV saturation in [0, 1]
    pub saturation_mean: f32,
    /// Mean per-channel standard deviation (0-255 scale)
    pub color_variance: f32,
    /// 256-bin histograms for R, G and B
    pub histograms: [Vec<u32>; 3],
}

impl Default for ColorAnalysis {
    fn default() -> Self {
        Self {
            dominant_colors: Vec::new(),
            brightness_mean: 0.0,
            brightness_std: 0.0,
            saturation_mean: 0.0,
            color_variance: 0.0,
            histograms: [vec![0; 256], vec![0; 256], vec![0; 256]],
        }
    }
}

/// Computes all color statistics for one frame.
pub fn analyze_colors(image: &RgbImage) -> ColorAnalysis {
    let pixel_count = image.width() as u64 * image.height() as u64;
    if pixel_count == 0 {
        return ColorAnalysis::default();
    }
    let n = pixel_count as f64;

    let mut histograms = [vec![0u32; 256], vec![0u32; 256], vec![0u32; 256]];
    let mut channel_sum = [0.0f64; 3];
    let mut channel_sum_sq = [0.0f64; 3];
    let mut lightness_sum = 0.0f64;
    let mut lightness_sum_sq = 0.0f64;
    let mut saturation_sum = 0.0f64;

    for pixel in image.pixels() {
        for c in 0..3 {
            let v = pixel[c] as f64;
            histograms[c][pixel[c] as usize] += 1;
            channel_sum[c] += v;
            channel_sum_sq[c] += v * v;
        }
        let l = pixel_lightness(pixel) as f64;
        lightness_sum += l;
        lightness_sum_sq += l * l;
        saturation_sum += pixel_saturation(pixel) as f64;
    }

    let brightness_mean = lightness_sum / n;
    let brightness_var = (lightness_sum_sq / n - brightness_mean * brightness_mean).max(0.0);

    let mut stddev_sum = 0.0f64;
    for c in 0..3 {
        let mean = channel_sum[c] / n;
        let var = (channel_sum_sq[c] / n - mean * mean).max(0.0);
        stddev_sum += var.sqrt();
    }

    ColorAnalysis {
        dominant_colors: dominant_colors(image),
        brightness_mean: brightness_mean as f32,
        brightness_std: brightness_var.sqrt() as f32,
        saturation_mean: (saturation_sum / n) as f32,
        color_variance: (stddev_sum / 3.0) as f32,
        histograms,
    }
}

/// HSV saturation of one pixel in [0, 1].
pub fn pixel_saturation(pixel: &Rgb<u8>) -> f32 {
    let max = pixel.0.iter().copied().max().unwrap_or(0) as f32;
    let min = pixel.0.iter().copied().min().unwrap_or(0) as f32;
    if max <= 0.0 {
        return 0.0;
    }
    (max - min) / max
}

/// Lab L* lightness of one pixel (0-100).
pub fn pixel_lightness(pixel: &Rgb<u8>) -> f32 {
    // Relative luminance from linearized sRGB, then the CIE L* transfer.
    let linear = |v: u8| {
        let s = v as f32 / 255.0;
        if s <= 0.04045 {
            s / 12.92
        } else {
            ((s + 0.055) / 1.055).powf(2.4)
        }
    };
    let y = 0.2126 * linear(pixel[0]) + 0.7152 * linear(pixel[1]) + 0.0722 * linear(pixel[2]);
    let f = if y > 0.008856 {
        y.powf(1.0 / 3.0)
    } else {
        7.787 * y + 16.0 / 116.0
    };
    (116.0 * f - 16.0).clamp(0.0, 100.0)
}

/// Extracts the dominant colors with k-means over a pixel sample.
fn dominant_colors(image: &RgbImage) -> Vec<[u8; 3]> {
    let pixels: Vec<&Rgb<u8>> = image.pixels().collect();
    if pixels.is_empty() {
        return Vec::new();
    }

    let stride = (pixels.len() / KMEANS_MAX_SAMPLES).max(1);
    let samples: Vec<[f32; 3]> = pixels
        .iter()
        .step_by(stride)
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect();

    let k = KMEANS_CLUSTERS.min(samples.len());
    // Seed centers from evenly spaced samples in color order, so frames with
    // few distinct colors still get seeds in each of them
    let mut sorted = samples.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut centers: Vec<[f32; 3]> = (0..k)
        .map(|i| sorted[i * sorted.len() / k])
        .collect();
    let mut assignment = vec![0usize; samples.len()];

    for _ in 0..KMEANS_ITERATIONS {
        for (i, s) in samples.iter().enumerate() {
            let mut best = 0;
            let mut best_dist = f32::MAX;
            for (c, center) in centers.iter().enumerate() {
                let d = (s[0] - center[0]).powi(2)
                    + (s[1] - center[1]).powi(2)
                    + (s[2] - center[2]).powi(2);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            assignment[i] = best;
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (i, s) in samples.iter().enumerate() {
            let c = assignment[i];
            counts[c] += 1;
            for ch in 0..3 {
                sums[c][ch] += s[ch] as f64;
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                for ch in 0..3 {
                    centers[c][ch] = (sums[c][ch] / counts[c] as f64) as f32;
                }
            }
        }
    }

    // Order clusters by population, largest first
    let mut counts = vec![0usize; k];
    for &a in &assignment {
        counts[a] += 1;
    }
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|a, b| counts[*b].cmp(&counts[*a]));

    order
        .into_iter()
        .filter(|&c| counts[c] > 0)
        .map(|c| {
            [
                centers[c][0].round().clamp(0.0, 255.0) as u8,
                centers[c][1].round().clamp(0.0, 255.0) as u8,
                centers[c][2].round().clamp(0.0, 255.0) as u8,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_frame_stats() {
        let img = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
        let analysis = analyze_colors(&img);
        assert!(analysis.brightness_mean < 0.001);
        assert!(analysis.brightness_std < 0.001);
        assert!(analysis.saturation_mean < 0.001);
        assert_eq!(analysis.histograms[0][0], 32 * 32);
    }

    #[test]
    fn test_white_frame_lightness() {
        let img = RgbImage::from_pixel(16, 16, Rgb([255, 255, 255]));
        let analysis = analyze_colors(&img);
        assert!((analysis.brightness_mean - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_dominant_color_of_solid_frame() {
        let img = RgbImage::from_pixel(32, 32, Rgb([200, 50, 25]));
        let analysis = analyze_colors(&img);
        assert!(!analysis.dominant_colors.is_empty());
        assert_eq!(analysis.dominant_colors[0], [200, 50, 25]);
    }

    #[test]
    fn test_two_color_frame_finds_both() {
        let img = RgbImage::from_fn(40, 40, |x, _| {
            if x < 20 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let analysis = analyze_colors(&img);
        assert!(analysis.dominant_colors.contains(&[255, 0, 0]));
        assert!(analysis.dominant_colors.contains(&[0, 0, 255]));
    }

    #[test]
    fn test_saturation() {
        assert!((pixel_saturation(&Rgb([255, 0, 0])) - 1.0).abs() < 0.001);
        assert!(pixel_saturation(&Rgb([128, 128, 128])) < 0.001);
    }

    #[test]
    fn test_empty_image() {
        let img = RgbImage::new(0, 0);
        let analysis = analyze_colors(&img);
        assert!(analysis.dominant_colors.is_empty());
    }
}
