//! Text recognizer: OCR, filtering, classification and line merging.

pub mod backend;
pub mod classify;

pub use backend::{NoopTextBackend, OcrWord, TesseractBackend, TextRecognitionBackend};
pub use classify::TextElement;

use serde::{Deserialize, Serialize};

use crate::config::{PreprocessConfig, TextConfig};
use crate::frame::Frame;
use crate::preprocess::preprocess;

/// Complete text analysis for one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextAnalysis {
    pub text_elements: Vec<TextElement>,
    /// All recognized text joined with spaces, reading order
    pub full_text: String,
    /// Mean OCR confidence of kept elements (0-100)
    pub confidence: f32,
    /// Languages the OCR engine was configured with
    pub languages: Vec<String>,
}

/// Recognizes and classifies on-screen text.
pub struct TextRecognizer {
    config: TextConfig,
    preprocess_config: PreprocessConfig,
    backend: Box<dyn TextRecognitionBackend>,
    backend_available: bool,
}

impl TextRecognizer {
    /// Creates a recognizer with the Tesseract backend, degrading to a no-op
    /// backend when the engine is not installed. The degradation is logged
    /// once here, not per call.
    pub fn new(config: TextConfig, preprocess_config: PreprocessConfig) -> Self {
        match TesseractBackend::new(&config) {
            Ok(backend) => Self {
                config,
                preprocess_config,
                backend: Box::new(backend),
                backend_available: true,
            },
            Err(e) => {
                log::warn!("OCR engine unavailable ({}); text recognition disabled", e);
                Self {
                    config,
                    preprocess_config,
                    backend: Box::new(NoopTextBackend),
                    backend_available: false,
                }
            }
        }
    }

    /// Creates a recognizer with an explicit backend.
    pub fn with_backend(
        config: TextConfig,
        preprocess_config: PreprocessConfig,
        backend: Box<dyn TextRecognitionBackend>,
    ) -> Self {
        Self {
            config,
            preprocess_config,
            backend,
            backend_available: true,
        }
    }

    /// True when a real OCR engine is behind this recognizer.
    pub fn is_available(&self) -> bool {
        self.backend_available
    }

    /// Runs OCR over the preprocessed frame and returns filtered, classified
    /// and merged text elements. OCR failures yield an empty result, never
    /// an error to the caller.
    pub fn recognize(&self, frame: &Frame) -> TextAnalysis {
        let gray = preprocess(&frame.image, &self.preprocess_config);

        let words = match self.backend.recognize(&gray) {
            Ok(words) => words,
            Err(e) => {
                log::warn!("OCR call failed ({}); returning empty text analysis", e);
                Vec::new()
            }
        };

        let elements: Vec<TextElement> = words
            .into_iter()
            .filter(|w| {
                let len = w.text.chars().count();
                w.confidence >= self.config.min_confidence
                    && len >= self.config.min_text_length
                    && len <= self.config.max_text_length
            })
            .map(|w| {
                let text_type = classify::classify_text(&w.text).to_string();
                TextElement {
                    is_numeric: text_type == "numeric_value",
                    is_ui_element: text_type == "ui_element",
                    text: w.text,
                    bounds: w.bounds,
                    confidence: w.confidence,
                    text_type,
                }
            })
            .collect();

        let merged = classify::merge_text_elements(elements, &self.config);

        let confidence = if merged.is_empty() {
            0.0
        } else {
            merged.iter().map(|e| e.confidence).sum::<f32>() / merged.len() as f32
        };
        let full_text = merged
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        TextAnalysis {
            text_elements: merged,
            full_text,
            confidence,
            languages: vec![self.config.language.clone()],
        }
    }
}
