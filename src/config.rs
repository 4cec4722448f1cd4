//! Pipeline configuration.
//!
//! Every threshold used by the analysis components lives here as a named,
//! typed field with a default. A config file is optional: `load` falls back
//! to defaults if the file is missing or unparsable, so the pipeline always
//! starts with a usable configuration.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete configuration for one pipeline instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub visual: VisualConfig,
    pub text: TextConfig,
    pub objects: ObjectConfig,
    pub compare: CompareConfig,
    pub issues: IssueConfig,
    pub store: StoreConfig,
}

/// Frame preprocessing toggles (§ preprocessor runs before OCR).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Apply a median filter before analysis
    pub denoise: bool,
    /// Apply histogram equalization
    pub enhance_contrast: bool,
    /// Apply adaptive-threshold binarization
    pub adaptive_threshold: bool,
    /// Estimate and correct text skew
    pub deskew: bool,
    /// Median filter radius in pixels
    pub denoise_radius: u32,
    /// Block radius for adaptive thresholding
    pub threshold_block_radius: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            denoise: true,
            enhance_contrast: true,
            adaptive_threshold: false,
            deskew: false,
            denoise_radius: 1,
            threshold_block_radius: 10,
        }
    }
}

/// Visual analyzer thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Canny lower threshold
    pub canny_low: f32,
    /// Canny upper threshold
    pub canny_high: f32,
    /// Minimum contour area for a UI-element candidate
    pub min_ui_area: u64,
    /// Maximum contour area for a UI-element candidate
    pub max_ui_area: u64,
    /// Minimum solidity (contour area / hull area) to keep a shape
    pub min_shape_confidence: f32,
    /// Normalized cross-correlation threshold for template matches
    pub template_match_threshold: f32,
    /// Mean row-to-row difference fraction that flags tearing
    pub tearing_threshold: f32,
    /// Laplacian variance below this is blurry
    pub sharpness_threshold: f64,
    /// Mean brightness below this marks a black frame (0-255)
    pub black_frame_threshold: f32,
    /// Mean per-pixel difference against the previous frame that marks a
    /// scene change (0-255)
    pub frame_diff_threshold: f32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            // Low enough to pick up subdued HUD elements on mid-gray
            // backgrounds; a step of ~20 luma still produces an edge
            canny_low: 10.0,
            canny_high: 30.0,
            min_ui_area: 100,
            max_ui_area: 500_000,
            min_shape_confidence: 0.6,
            template_match_threshold: 0.8,
            tearing_threshold: 0.3,
            sharpness_threshold: 100.0,
            black_frame_threshold: 30.0,
            frame_diff_threshold: 30.0,
        }
    }
}

/// Text recognizer thresholds and OCR engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Minimum OCR confidence (0-100) to keep a word
    pub min_confidence: f32,
    /// Minimum recognized string length
    pub min_text_length: usize,
    /// Maximum recognized string length
    pub max_text_length: usize,
    /// OCR language passed to the engine
    pub language: String,
    /// Tesseract page segmentation mode
    pub page_seg_mode: u32,
    /// Optional character whitelist passed to the engine
    pub char_whitelist: Option<String>,
    /// Maximum horizontal gap (px) between fragments merged into one line
    pub merge_max_gap: i32,
    /// Minimum vertical overlap ratio for fragments merged into one line
    pub merge_min_overlap: f32,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            min_confidence: 30.0,
            min_text_length: 1,
            max_text_length: 120,
            language: "eng".to_string(),
            page_seg_mode: 11, // sparse text: find as much text as possible
            char_whitelist: None,
            merge_max_gap: 50,
            merge_min_overlap: 0.5,
        }
    }
}

/// Object detector and tracker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    /// Minimum detection confidence to keep
    pub min_confidence: f32,
    /// Minimum confidence to start tracking a detection
    pub min_tracking_confidence: f32,
    /// Maximum center distance (px) to match a detection to a track
    pub max_distance: f32,
    /// Consecutive missed frames before a track is marked disappeared
    pub max_disappeared: u32,
    /// Minimum blob area (px) for the fallback blob detector
    pub blob_min_area: u32,
    /// Brightness threshold (0-255) for the fallback blob detector
    pub blob_threshold: u8,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.4,
            min_tracking_confidence: 0.5,
            max_distance: 50.0,
            max_disappeared: 5,
            blob_min_area: 64,
            blob_threshold: 60,
        }
    }
}

/// State comparator tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Maximum per-axis position error (px) before a position mismatch,
    /// inclusive: an element exactly at the tolerance passes
    pub position_tolerance: i32,
    /// Minimum text similarity (0-1) to count as a match
    pub text_match_threshold: f32,
    /// Fractional tolerance on expected object counts
    pub count_tolerance: f32,
    /// UI elements that must always be present
    pub critical_elements: Vec<String>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            position_tolerance: 20,
            text_match_threshold: 0.8,
            count_tolerance: 0.1,
            critical_elements: vec![
                "health_bar".to_string(),
                "shield_bar".to_string(),
                "minimap".to_string(),
            ],
        }
    }
}

/// Issue classifier weights and cut points.
///
/// The numeric defaults here are tuning starting points, not contracts;
/// deployments are expected to adjust them from observed issue volumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueConfig {
    /// Weighted confidence at or above this is critical
    pub critical_threshold: f32,
    /// Weighted confidence at or above this is high
    pub high_threshold: f32,
    /// Weighted confidence at or above this is medium; below is low
    pub medium_threshold: f32,
    /// Category weight for visual_bug findings
    pub weight_visual_bug: f32,
    /// Category weight for ui_problem findings
    pub weight_ui_problem: f32,
    /// Category weight for gameplay_error findings
    pub weight_gameplay_error: f32,
    /// Category weight for performance_issue findings
    pub weight_performance_issue: f32,
    /// OCR confidence (0-100) below which a low_ocr_confidence issue is raised
    pub low_ocr_threshold: f32,
}

impl Default for IssueConfig {
    fn default() -> Self {
        Self {
            critical_threshold: 0.8,
            high_threshold: 0.6,
            medium_threshold: 0.4,
            weight_visual_bug: 0.8,
            weight_ui_problem: 0.9,
            weight_gameplay_error: 1.0,
            weight_performance_issue: 0.9,
            low_ocr_threshold: 40.0,
        }
    }
}

/// Result persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for analysis and report JSON files
    pub out_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("framecheck_results"),
        }
    }
}

impl PipelineConfig {
    /// Load config from a JSON file, or return defaults if it doesn't exist
    /// or fails to parse.
    pub fn load(config_path: &Path) -> Self {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(contents) => match serde_json::from_str::<PipelineConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Config loaded from {}", config_path.display());
                        return config;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", config_path.display(), e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", config_path.display(), e);
                }
            }
        } else {
            log::info!("{} not found. Using default config.", config_path.display());
        }
        Self::default()
    }

    /// Write the default configuration to a file for reference.
    pub fn save_default(config_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&Self::default())?;
        fs::write(config_path, json)?;
        Ok(())
    }

    /// Reject configurations that would make the pipeline misbehave rather
    /// than letting them surface as confusing runtime results.
    pub fn validate(&self) -> Result<()> {
        if self.visual.canny_low >= self.visual.canny_high {
            bail!("visual.canny_low must be below visual.canny_high");
        }
        if self.visual.min_ui_area >= self.visual.max_ui_area {
            bail!("visual.min_ui_area must be below visual.max_ui_area");
        }
        if self.preprocess.adaptive_threshold && self.preprocess.threshold_block_radius == 0 {
            bail!(
                "preprocess.threshold_block_radius must be positive when adaptive thresholding is enabled"
            );
        }
        if self.objects.max_distance <= 0.0 {
            bail!("objects.max_distance must be positive");
        }
        if self.compare.position_tolerance < 0 {
            bail!("compare.position_tolerance must be non-negative");
        }
        if !(0.0..=1.0).contains(&self.compare.text_match_threshold) {
            bail!("compare.text_match_threshold must be in [0, 1]");
        }
        if self.issues.medium_threshold > self.issues.high_threshold
            || self.issues.high_threshold > self.issues.critical_threshold
        {
            bail!("issue severity thresholds must be ordered medium <= high <= critical");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = PipelineConfig::load(Path::new("no_such_config.json"));
        assert_eq!(config.compare.position_tolerance, 20);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        PipelineConfig::save_default(&path).unwrap();
        let config = PipelineConfig::load(&path);
        assert!((config.objects.max_distance - 50.0).abs() < 0.001);
    }

    #[test]
    fn test_validate_rejects_bad_canny() {
        let mut config = PipelineConfig::default();
        config.visual.canny_low = 200.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threshold_block_radius() {
        let mut config = PipelineConfig::default();
        config.preprocess.adaptive_threshold = true;
        config.preprocess.threshold_block_radius = 0;
        assert!(config.validate().is_err());

        // A zero radius is harmless while adaptive thresholding is off
        config.preprocess.adaptive_threshold = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unordered_severity_thresholds() {
        let mut config = PipelineConfig::default();
        config.issues.medium_threshold = 0.9;
        assert!(config.validate().is_err());
    }
}
