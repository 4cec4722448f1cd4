//! Captured frame representation.
//!
//! A frame is an RGB pixel buffer plus capture metadata. Frames are owned by
//! the caller and passed into the pipeline by reference; the pipeline never
//! mutates them.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use std::collections::HashMap;
use std::path::Path;

/// One captured frame to be analyzed.
#[derive(Debug, Clone)]
pub struct Frame {
    /// RGB pixel buffer
    pub image: RgbImage,
    /// When the frame was captured
    pub captured_at: DateTime<Local>,
    /// Free-form metadata supplied by the capture source
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Frame {
    /// Wraps an already-decoded image buffer, timestamped now.
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Local::now(),
            metadata: HashMap::new(),
        }
    }

    /// Loads a frame from an image file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to load frame from {}", path.display()))?
            .to_rgb8();
        let mut frame = Self::new(image);
        frame.metadata.insert(
            "source_path".to_string(),
            serde_json::Value::String(path.display().to_string()),
        );
        Ok(frame)
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
