//! Visual analyzer: UI-region detection, artifact checks, color statistics
//! and scene-transition detection for one frame.
//!
//! The analyzer carries exactly one piece of cross-frame state, the previous
//! frame's grayscale buffer used for transition detection. Concurrent calls
//! into one instance must be serialized by the caller; independent instances
//! share nothing.

pub mod artifacts;
pub mod color;
pub mod diff;
pub mod shapes;

pub use artifacts::VisualArtifact;
pub use color::ColorAnalysis;
pub use diff::{compare_frames, FrameDiff};
pub use shapes::UiElement;

use std::collections::HashMap;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::config::{PreprocessConfig, VisualConfig};
use crate::frame::Frame;
use crate::preprocess::preprocess;

/// Scene-transition verdict for one frame relative to the previous one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionAnalysis {
    pub is_transition: bool,
    /// fade_to_black or scene_change when is_transition is set
    pub transition_type: Option<String>,
    pub confidence: f32,
}

/// Per-stage and aggregate confidence for one analysis call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidenceScores {
    pub ui: f32,
    pub artifacts: f32,
    pub color: f32,
    pub transition: f32,
    pub overall: f32,
}

/// Complete visual analysis of one frame. Every field is always present;
/// a failed sub-analysis contributes its empty/neutral value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualAnalysis {
    pub ui_elements: Vec<UiElement>,
    pub visual_artifacts: Vec<VisualArtifact>,
    pub color_analysis: ColorAnalysis,
    pub transition_analysis: TransitionAnalysis,
    pub confidence_scores: ConfidenceScores,
}

/// Stateful visual analyzer. One instance per frame stream.
pub struct VisualAnalyzer {
    config: VisualConfig,
    preprocess_config: PreprocessConfig,
    templates: HashMap<String, GrayImage>,
    previous_frame: Option<GrayImage>,
}

impl VisualAnalyzer {
    pub fn new(config: VisualConfig, preprocess_config: PreprocessConfig) -> Self {
        Self {
            config,
            preprocess_config,
            templates: HashMap::new(),
            previous_frame: None,
        }
    }

    /// Registers a named template for template matching.
    pub fn add_template(&mut self, name: &str, template: GrayImage) {
        self.templates.insert(name.to_string(), template);
    }

    /// Drops the previous-frame buffer so the next call starts fresh.
    pub fn reset(&mut self) {
        self.previous_frame = None;
    }

    /// Analyzes one frame. Sub-analyses degrade independently: a frame too
    /// small for contour analysis still gets color statistics, and so on.
    pub fn analyze(&mut self, frame: &Frame) -> VisualAnalysis {
        let gray = preprocess(&frame.image, &self.preprocess_config);
        // Shape detection works on an unequalized grayscale so template
        // correlation scores stay comparable across frames
        let plain_gray = image::imageops::grayscale(&frame.image);

        let mut ui_elements = shapes::detect_ui_elements(&plain_gray, &self.config);
        ui_elements.extend(shapes::match_templates(
            &plain_gray,
            &self.templates,
            self.config.template_match_threshold,
        ));

        let visual_artifacts = artifacts::detect_artifacts(&frame.image, &gray, &self.config);
        let color_analysis = color::analyze_colors(&frame.image);
        let transition_analysis = self.detect_transition(&plain_gray);

        // Previous-frame slot is updated unconditionally, single-slot memory
        self.previous_frame = Some(plain_gray);

        let confidence_scores =
            aggregate_confidence(&ui_elements, &visual_artifacts, &color_analysis, &transition_analysis);

        log::debug!(
            "Visual analysis: {} UI elements, {} artifacts, transition={}",
            ui_elements.len(),
            visual_artifacts.len(),
            transition_analysis.is_transition
        );

        VisualAnalysis {
            ui_elements,
            visual_artifacts,
            color_analysis,
            transition_analysis,
            confidence_scores,
        }
    }

    /// Classifies the frame as a fade-to-black or, against the previous
    /// frame, a scene change.
    fn detect_transition(&self, gray: &GrayImage) -> TransitionAnalysis {
        let mean = mean_brightness(gray);

        if mean < self.config.black_frame_threshold {
            let confidence = 1.0 - mean / self.config.black_frame_threshold;
            return TransitionAnalysis {
                is_transition: true,
                transition_type: Some("fade_to_black".to_string()),
                confidence: confidence.clamp(0.0, 1.0),
            };
        }

        if let Some(previous) = &self.previous_frame {
            if previous.dimensions() == gray.dimensions() {
                let diff = mean_abs_diff(previous, gray);
                if diff > self.config.frame_diff_threshold {
                    let confidence = (diff / (self.config.frame_diff_threshold * 2.0)).min(1.0);
                    return TransitionAnalysis {
                        is_transition: true,
                        transition_type: Some("scene_change".to_string()),
                        confidence,
                    };
                }
            }
        }

        TransitionAnalysis::default()
    }
}

fn mean_brightness(gray: &GrayImage) -> f32 {
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let sum: u64 = gray.pixels().map(|p| p[0] as u64).sum();
    sum as f32 / total as f32
}

fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> f32 {
    let total = a.width() as u64 * a.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let sum: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| (pa[0] as i32 - pb[0] as i32).unsigned_abs() as u64)
        .sum();
    sum as f32 / total as f32
}

/// Weighted confidence aggregate: UI 0.3, artifacts 0.3, color 0.2,
/// transition 0.2. Absence of artifacts counts as full artifact confidence.
fn aggregate_confidence(
    ui_elements: &[UiElement],
    artifacts: &[VisualArtifact],
    color: &ColorAnalysis,
    transition: &TransitionAnalysis,
) -> ConfidenceScores {
    let ui = if ui_elements.is_empty() {
        0.5
    } else {
        ui_elements.iter().map(|e| e.confidence).sum::<f32>() / ui_elements.len() as f32
    };

    let artifact_conf = if artifacts.is_empty() {
        1.0
    } else {
        let mean_severity =
            artifacts.iter().map(|a| a.severity).sum::<f32>() / artifacts.len() as f32;
        (1.0 - mean_severity).clamp(0.0, 1.0)
    };

    let color_conf = (color.color_variance / 50.0).min(1.0);

    let transition_conf = if transition.is_transition {
        transition.confidence
    } else {
        1.0
    };

    ConfidenceScores {
        ui,
        artifacts: artifact_conf,
        color: color_conf,
        transition: transition_conf,
        overall: ui * 0.3 + artifact_conf * 0.3 + color_conf * 0.2 + transition_conf * 0.2,
    }
}
