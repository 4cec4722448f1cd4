//! Automated visual verification for game screenshots.
//!
//! The crate takes captured frames and checks them against an expected game
//! state: UI elements present and in place, on-screen text readable and
//! correct, tracked entities at the expected counts, and the rendering free
//! of artifacts like tearing or blur. Findings are classified into
//! severity-ranked issues and persisted as JSON analyses and reports.
//!
//! The entry point for most callers is [`pipeline::Pipeline`], which wires
//! the analyzers together; the individual analyzers ([`visual::VisualAnalyzer`],
//! [`text::TextRecognizer`], [`objects::ObjectDetector`],
//! [`compare::StateComparator`], [`issues::IssueClassifier`]) are usable on
//! their own.

pub mod compare;
pub mod config;
pub mod frame;
pub mod geometry;
pub mod issues;
pub mod objects;
pub mod pipeline;
pub mod preprocess;
pub mod store;
pub mod text;
pub mod visual;

use serde::{Deserialize, Serialize};

/// Severity of a finding, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Weight used when aggregating findings into an overall confidence.
    pub fn weight(&self) -> f32 {
        match self {
            Severity::Low => 0.1,
            Severity::Medium => 0.3,
            Severity::High => 0.7,
            Severity::Critical => 1.0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        let parsed: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, Severity::Medium);
    }
}
