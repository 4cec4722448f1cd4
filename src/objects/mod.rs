//! Object detector: pluggable detection model plus multi-frame tracking.

pub mod backend;
pub mod tracking;

pub use backend::{
    BlobBackend, FixedObjectBackend, NoopObjectBackend, ObjectDetectionBackend, RawDetection,
};
pub use tracking::{CentroidTracker, ObjectTrack};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ObjectConfig;
use crate::frame::Frame;
use crate::geometry::Rect;

/// One detected, possibly tracked, game entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedObject {
    pub class_name: String,
    pub confidence: f32,
    pub bounds: Rect,
    pub center: (f32, f32),
    /// Persistent identity assigned by the tracker
    pub object_id: Option<u64>,
    pub tracked: bool,
}

/// Complete object analysis for one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectAnalysis {
    pub detected_objects: Vec<DetectedObject>,
    /// Snapshot of all tracking records, disappeared tracks included
    pub tracking: Vec<ObjectTrack>,
    /// Mean confidence of this frame's detections
    pub model_confidence: f32,
    /// 1-based counter of detect() calls on this instance
    pub frame_number: u64,
}

/// Detects and tracks game entities. One instance per frame stream; calls
/// must be serialized by the caller (the tracker is cross-frame state).
pub struct ObjectDetector {
    config: ObjectConfig,
    backend: Box<dyn ObjectDetectionBackend>,
    /// Raw model class name -> domain class name
    class_map: HashMap<String, String>,
    tracker: CentroidTracker,
    frame_number: u64,
}

impl ObjectDetector {
    /// Creates a detector with the given model, or the built-in blob
    /// fallback when none is supplied.
    pub fn new(config: ObjectConfig, backend: Option<Box<dyn ObjectDetectionBackend>>) -> Self {
        let backend = match backend {
            Some(backend) => backend,
            None => {
                log::info!("No detection model supplied; using blob fallback detector");
                Box::new(BlobBackend::new(&config))
            }
        };
        Self {
            tracker: CentroidTracker::new(config.clone()),
            config,
            backend,
            class_map: HashMap::new(),
            frame_number: 0,
        }
    }

    /// Installs a raw-class to domain-class mapping, e.g. "blob" ->
    /// "asteroid" for the generic fallback model.
    pub fn set_class_map(&mut self, class_map: HashMap<String, String>) {
        self.class_map = class_map;
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Runs detection and tracking for one frame. A failing backend yields
    /// an empty detection list, never an error; the tracker still ages so
    /// disappearance accounting stays correct.
    pub fn detect(&mut self, frame: &Frame) -> ObjectAnalysis {
        self.frame_number += 1;

        let mut detections = match self.backend.infer(&frame.image) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("Detection backend '{}' failed: {}", self.backend.name(), e);
                Vec::new()
            }
        };

        detections.retain(|d| d.confidence >= self.config.min_confidence);
        for detection in &mut detections {
            if let Some(mapped) = self.class_map.get(&detection.class_name) {
                detection.class_name = mapped.clone();
            }
        }

        let assignments = self.tracker.update(&detections);

        let detected_objects: Vec<DetectedObject> = detections
            .iter()
            .zip(assignments.iter())
            .map(|(d, id)| DetectedObject {
                class_name: d.class_name.clone(),
                confidence: d.confidence,
                bounds: d.bounds,
                center: d.bounds.center(),
                object_id: *id,
                tracked: id.is_some(),
            })
            .collect();

        let model_confidence = if detected_objects.is_empty() {
            0.0
        } else {
            detected_objects.iter().map(|o| o.confidence).sum::<f32>()
                / detected_objects.len() as f32
        };

        ObjectAnalysis {
            tracking: self.tracker.tracks().cloned().collect(),
            detected_objects,
            model_confidence,
            frame_number: self.frame_number,
        }
    }

    /// Position history for one tracked object.
    pub fn movement_history(&self, object_id: u64) -> Option<&[(f32, f32)]> {
        self.tracker.movement_history(object_id)
    }

    /// Clears tracking state and the frame counter.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.frame_number = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame() -> Frame {
        Frame::new(RgbImage::from_pixel(320, 240, Rgb([0, 0, 0])))
    }

    fn fixed(detections: Vec<RawDetection>) -> ObjectDetector {
        ObjectDetector::new(
            ObjectConfig::default(),
            Some(Box::new(FixedObjectBackend { detections })),
        )
    }

    #[test]
    fn test_detect_assigns_ids_and_counts_frames() {
        let mut detector = fixed(vec![RawDetection {
            class_name: "ship".to_string(),
            confidence: 0.9,
            bounds: Rect::new(100, 100, 30, 30),
        }]);

        let first = detector.detect(&frame());
        assert_eq!(first.frame_number, 1);
        assert_eq!(first.detected_objects.len(), 1);
        assert!(first.detected_objects[0].tracked);

        let second = detector.detect(&frame());
        assert_eq!(second.frame_number, 2);
        assert_eq!(
            second.detected_objects[0].object_id,
            first.detected_objects[0].object_id
        );
    }

    #[test]
    fn test_confidence_filter_drops_weak_detections() {
        let mut detector = fixed(vec![RawDetection {
            class_name: "ship".to_string(),
            confidence: 0.1,
            bounds: Rect::new(0, 0, 10, 10),
        }]);
        let analysis = detector.detect(&frame());
        assert!(analysis.detected_objects.is_empty());
        assert_eq!(analysis.model_confidence, 0.0);
    }

    #[test]
    fn test_class_map_renames_fallback_classes() {
        let mut detector = fixed(vec![RawDetection {
            class_name: "blob".to_string(),
            confidence: 0.8,
            bounds: Rect::new(50, 50, 20, 20),
        }]);
        detector.set_class_map(HashMap::from([(
            "blob".to_string(),
            "asteroid".to_string(),
        )]));
        let analysis = detector.detect(&frame());
        assert_eq!(analysis.detected_objects[0].class_name, "asteroid");
    }

    #[test]
    fn test_failing_backend_returns_empty() {
        struct FailingBackend;
        impl ObjectDetectionBackend for FailingBackend {
            fn name(&self) -> &str {
                "failing"
            }
            fn infer(&self, _image: &RgbImage) -> anyhow::Result<Vec<RawDetection>> {
                anyhow::bail!("model not loaded")
            }
        }
        let mut detector =
            ObjectDetector::new(ObjectConfig::default(), Some(Box::new(FailingBackend)));
        let analysis = detector.detect(&frame());
        assert!(analysis.detected_objects.is_empty());
        assert_eq!(analysis.frame_number, 1);
    }

    #[test]
    fn test_reset_clears_tracking() {
        let mut detector = fixed(vec![RawDetection {
            class_name: "ship".to_string(),
            confidence: 0.9,
            bounds: Rect::new(100, 100, 30, 30),
        }]);
        detector.detect(&frame());
        detector.reset();
        let analysis = detector.detect(&frame());
        assert_eq!(analysis.frame_number, 1);
        assert_eq!(analysis.tracking.len(), 1);
    }
}
