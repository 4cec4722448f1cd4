//! OCR backends.
//!
//! The recognizer talks to OCR through one small trait so engines can be
//! swapped, faked in tests, or replaced with a no-op when nothing is
//! installed. The real backend shells out to the `tesseract` executable and
//! parses its TSV output for word boxes and confidences.

use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::process::Command;
use tempfile::NamedTempFile;

use crate::config::TextConfig;
use crate::geometry::Rect;

/// One recognized word with its bounding box and engine confidence (0-100).
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
    pub bounds: Rect,
}

/// Capability contract for OCR engines.
pub trait TextRecognitionBackend: Send {
    fn name(&self) -> &str;
    fn recognize(&self, image: &GrayImage) -> Result<Vec<OcrWord>>;
}

/// Backend used when no OCR engine is available: every call succeeds with
/// an empty result so the pipeline keeps running.
pub struct NoopTextBackend;

impl TextRecognitionBackend for NoopTextBackend {
    fn name(&self) -> &str {
        "noop"
    }

    fn recognize(&self, _image: &GrayImage) -> Result<Vec<OcrWord>> {
        Ok(Vec::new())
    }
}

/// Tesseract subprocess backend.
pub struct TesseractBackend {
    language: String,
    page_seg_mode: u32,
    char_whitelist: Option<String>,
}

impl TesseractBackend {
    /// Probes for the `tesseract` executable; errors if it is not runnable.
    pub fn new(config: &TextConfig) -> Result<Self> {
        let probe = Command::new("tesseract")
            .arg("--version")
            .output()
            .context("tesseract executable not found on PATH")?;
        if !probe.status.success() {
            return Err(anyhow!("tesseract --version failed"));
        }
        Ok(Self {
            language: config.language.clone(),
            page_seg_mode: config.page_seg_mode,
            char_whitelist: config.char_whitelist.clone(),
        })
    }
}

impl TextRecognitionBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage) -> Result<Vec<OcrWord>> {
        // Tesseract reads from disk, so hand it a temp PNG
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image.save(temp_input.path())?;

        // Output base path; tesseract appends .tsv
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new("tesseract");
        command
            .arg(temp_input.path())
            .arg(&output_base)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_seg_mode.to_string());
        if let Some(whitelist) = &self.char_whitelist {
            command.arg("-c").arg(format!("tessedit_char_whitelist={}", whitelist));
        }
        command.arg("tsv");

        let output = command.output().context("failed to run tesseract")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .with_context(|| format!("failed to read tesseract output {}", tsv_path))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_words(&tsv_content))
    }
}

/// Parses Tesseract TSV output into words with boxes.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Level 5 rows are words.
fn parse_tsv_words(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        if conf < 0.0 {
            continue;
        }

        let left: i32 = fields[6].parse().unwrap_or(0);
        let top: i32 = fields[7].parse().unwrap_or(0);
        let width: u32 = fields[8].parse().unwrap_or(0);
        let height: u32 = fields[9].parse().unwrap_or(0);

        words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
            bounds: Rect::new(left, top, width, height),
        });
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t\n\
5\t1\t1\t1\t1\t1\t100\t50\t80\t20\t91.5\tHEALTH\n\
5\t1\t1\t1\t1\t2\t190\t52\t40\t18\t88.0\t75\n\
5\t1\t1\t1\t2\t1\t10\t400\t60\t20\t-1\tnoise\n";

    #[test]
    fn test_parse_tsv_words() {
        let words = parse_tsv_words(SAMPLE_TSV);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "HEALTH");
        assert!((words[0].confidence - 91.5).abs() < 0.001);
        assert_eq!(words[0].bounds, Rect::new(100, 50, 80, 20));
        assert_eq!(words[1].text, "75");
    }

    #[test]
    fn test_parse_tsv_skips_non_word_levels() {
        let words = parse_tsv_words("level\t...\n1\t1\t0\t0\t0\t0\t0\t0\t10\t10\t-1\tpage\n");
        assert!(words.is_empty());
    }

    #[test]
    fn test_noop_backend_returns_empty() {
        let backend = NoopTextBackend;
        let img = GrayImage::new(10, 10);
        assert!(backend.recognize(&img).unwrap().is_empty());
    }
}
