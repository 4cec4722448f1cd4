//! Object-detection backends.
//!
//! Detection models are consumed through one trait: given a frame, return
//! class/confidence/box tuples. The built-in fallback is a brightness-blob
//! detector over connected components; it knows nothing about game entities
//! but keeps the tracker and comparator exercised when no model is loaded.

use anyhow::Result;
use image::{Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::config::ObjectConfig;
use crate::geometry::Rect;

/// One raw model detection before tracking.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub class_name: String,
    pub confidence: f32,
    pub bounds: Rect,
}

/// Capability contract for detection models.
pub trait ObjectDetectionBackend: Send {
    fn name(&self) -> &str;
    fn infer(&self, image: &RgbImage) -> Result<Vec<RawDetection>>;
}

/// Backend used when no model at all is available.
pub struct NoopObjectBackend;

impl ObjectDetectionBackend for NoopObjectBackend {
    fn name(&self) -> &str {
        "noop"
    }

    fn infer(&self, _image: &RgbImage) -> Result<Vec<RawDetection>> {
        Ok(Vec::new())
    }
}

/// Fallback detector: thresholds the frame and reports each bright
/// connected component as a "blob" detection. Confidence grows with blob
/// area, saturating well below certainty since this is a crude model.
pub struct BlobBackend {
    threshold: u8,
    min_area: u32,
}

impl BlobBackend {
    pub fn new(config: &ObjectConfig) -> Self {
        Self {
            threshold: config.blob_threshold,
            min_area: config.blob_min_area,
        }
    }
}

impl ObjectDetectionBackend for BlobBackend {
    fn name(&self) -> &str {
        "blob"
    }

    fn infer(&self, image: &RgbImage) -> Result<Vec<RawDetection>> {
        let gray = image::imageops::grayscale(image);
        let binary = image::GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y)[0] > self.threshold {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

        // Accumulate per-label bounding boxes and pixel counts
        let mut boxes: std::collections::HashMap<u32, (u32, u32, u32, u32, u32)> =
            std::collections::HashMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let id = label[0];
            if id == 0 {
                continue;
            }
            let entry = boxes.entry(id).or_insert((x, y, x, y, 0));
            entry.0 = entry.0.min(x);
            entry.1 = entry.1.min(y);
            entry.2 = entry.2.max(x);
            entry.3 = entry.3.max(y);
            entry.4 += 1;
        }

        let mut detections: Vec<RawDetection> = boxes
            .into_values()
            .filter(|&(_, _, _, _, area)| area >= self.min_area)
            .map(|(min_x, min_y, max_x, max_y, area)| RawDetection {
                class_name: "blob".to_string(),
                confidence: (area as f32 / (self.min_area as f32 * 4.0)).clamp(0.4, 0.9),
                bounds: Rect::new(
                    min_x as i32,
                    min_y as i32,
                    max_x - min_x + 1,
                    max_y - min_y + 1,
                ),
            })
            .collect();

        // Stable output order for deterministic tracking
        detections.sort_by_key(|d| (d.bounds.y, d.bounds.x));
        Ok(detections)
    }
}

/// Backend returning a fixed detection list on every call. Used for tests
/// and for replaying recorded model output.
pub struct FixedObjectBackend {
    pub detections: Vec<RawDetection>,
}

impl ObjectDetectionBackend for FixedObjectBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    fn infer(&self, _image: &RgbImage) -> Result<Vec<RawDetection>> {
        Ok(self.detections.clone())
    }
}
