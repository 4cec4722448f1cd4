//! Issue classifier: turns raw artifacts and discrepancies into a
//! deduplicated, severity-ranked issue stream with suggested fixes and a
//! per-pass summary.

pub mod history;

pub use history::{IssueHistory, IssueRecord};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::compare::StateDiscrepancy;
use crate::config::IssueConfig;
use crate::text::TextElement;
use crate::visual::VisualArtifact;
use crate::Severity;

/// Issue category, used to weight severity and group recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    VisualBug,
    UiProblem,
    GameplayError,
    PerformanceIssue,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::VisualBug => "visual_bug",
            IssueCategory::UiProblem => "ui_problem",
            IssueCategory::GameplayError => "gameplay_error",
            IssueCategory::PerformanceIssue => "performance_issue",
        }
    }
}

/// One classified, history-deduplicated issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedIssue {
    pub issue_id: String,
    pub issue_type: String,
    pub severity: Severity,
    pub category: IssueCategory,
    pub description: String,
    pub location: (i32, i32),
    pub confidence: f32,
    pub suggested_fix: String,
    pub affected_components: Vec<String>,
    /// Occurrence count from the issue history
    pub frequency: u64,
    pub first_seen: DateTime<Local>,
    pub last_seen: DateTime<Local>,
}

/// Raw findings fed into one classification pass. Any subset may be empty.
#[derive(Debug, Clone, Default)]
pub struct ClassifierInput {
    pub visual_artifacts: Vec<VisualArtifact>,
    pub text_elements: Vec<TextElement>,
    pub state_discrepancies: Vec<StateDiscrepancy>,
}

/// Aggregate view over one classification pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueSummary {
    pub total_issues: usize,
    pub by_category: HashMap<String, usize>,
    pub by_severity: HashMap<String, usize>,
    pub by_type: HashMap<String, usize>,
    /// (issue_type, occurrence count), most frequent first, at most five
    pub top_issues: Vec<(String, u64)>,
    pub recommendations: Vec<String>,
}

/// Output of one classification pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classified_issues: Vec<ClassifiedIssue>,
    pub summary: IssueSummary,
    pub severity_counts: HashMap<String, usize>,
}

/// Stateful classifier. The issue history is the one long-lived structure
/// shared across all frames this instance processes; calls must be
/// serialized by the caller.
pub struct IssueClassifier {
    config: IssueConfig,
    history: IssueHistory,
}

impl IssueClassifier {
    pub fn new(config: IssueConfig) -> Self {
        Self {
            config,
            history: IssueHistory::new(),
        }
    }

    pub fn history(&self) -> &IssueHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut IssueHistory {
        &mut self.history
    }

    /// Classifies one pass of findings. Each input category contributes
    /// independently; an empty category simply contributes nothing.
    pub fn classify(
        &mut self,
        input: &ClassifierInput,
        screenshot_id: Option<&str>,
    ) -> ClassificationResult {
        let mut issues = Vec::new();
        issues.extend(self.classify_artifacts(&input.visual_artifacts));
        issues.extend(self.classify_text(&input.text_elements));
        issues.extend(self.classify_discrepancies(&input.state_discrepancies));

        // History pass: dedup key is type + location
        for issue in &mut issues {
            let frequency = self.history.record(
                &issue.issue_type,
                issue.category.as_str(),
                issue.location,
                issue.severity,
                screenshot_id,
            );
            issue.frequency = frequency;
            if let Some(record) = self.history.get(&issue.issue_type, issue.location) {
                issue.first_seen = record.first_seen;
                issue.last_seen = record.last_seen;
            }
        }

        issues.sort_by(|a, b| b.severity.cmp(&a.severity));

        let severity_counts = count_by(&issues, |i| i.severity.as_str().to_string());
        let summary = self.summarize(&issues);

        ClassificationResult {
            classified_issues: issues,
            summary,
            severity_counts,
        }
    }

    fn classify_artifacts(&self, artifacts: &[VisualArtifact]) -> Vec<ClassifiedIssue> {
        artifacts
            .iter()
            .map(|artifact| {
                let (issue_type, category) = match artifact.artifact_type.as_str() {
                    "tearing" => ("screen_tearing", IssueCategory::VisualBug),
                    "color_anomaly" => ("color_anomaly", IssueCategory::VisualBug),
                    "blurriness" => ("blurry_rendering", IssueCategory::VisualBug),
                    "oversharpening" => ("oversharpened_rendering", IssueCategory::VisualBug),
                    _ => ("visual_artifact", IssueCategory::VisualBug),
                };
                self.build_issue(
                    issue_type,
                    category,
                    artifact.description.clone(),
                    artifact.location,
                    artifact.confidence.max(artifact.severity),
                    None,
                )
            })
            .collect()
    }

    /// Synthesizes text-quality issues that no other component reports:
    /// unreadably low OCR confidence and probable cutoff between adjacent
    /// fragments. The cutoff check is best-effort, not a certainty.
    fn classify_text(&self, elements: &[TextElement]) -> Vec<ClassifiedIssue> {
        let mut issues = Vec::new();

        for element in elements {
            if element.confidence < self.config.low_ocr_threshold {
                issues.push(self.build_issue(
                    "low_ocr_confidence",
                    IssueCategory::UiProblem,
                    format!(
                        "Text '{}' recognized at only {:.0}% confidence",
                        element.text, element.confidence
                    ),
                    (element.bounds.x, element.bounds.y),
                    1.0 - element.confidence / 100.0,
                    None,
                ));
            }
        }

        let mut sorted: Vec<&TextElement> = elements.iter().collect();
        sorted.sort_by_key(|e| (e.bounds.y, e.bounds.x));
        for pair in sorted.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let adjacent = a.bounds.horizontal_gap(&b.bounds) < 10
                && a.bounds.vertical_overlap_ratio(&b.bounds) > 0.7;
            let truncated = a.text.ends_with('-')
                || a.text.ends_with('…')
                || a.text.ends_with("...")
                || a.text.chars().count() < 3;
            if adjacent && truncated {
                issues.push(self.build_issue(
                    "possible_text_cutoff",
                    IssueCategory::UiProblem,
                    format!("Text '{}' appears cut off before '{}'", a.text, b.text),
                    (a.bounds.x, a.bounds.y),
                    0.4,
                    Some(Severity::Low),
                ));
            }
        }

        issues
    }

    fn classify_discrepancies(&self, discrepancies: &[StateDiscrepancy]) -> Vec<ClassifiedIssue> {
        discrepancies
            .iter()
            .map(|d| {
                let (issue_type, category) = match d.discrepancy_type.as_str() {
                    "missing_ui_element" => ("missing_ui_element", IssueCategory::UiProblem),
                    "ui_position_mismatch" => ("misplaced_ui_element", IssueCategory::UiProblem),
                    "missing_text" => ("missing_text", IssueCategory::UiProblem),
                    "text_position_mismatch" => ("misplaced_text", IssueCategory::UiProblem),
                    "object_count_mismatch" => {
                        ("object_count_mismatch", IssueCategory::GameplayError)
                    }
                    "missing_critical_element" => {
                        ("missing_critical_element", IssueCategory::GameplayError)
                    }
                    _ => ("state_validation_error", IssueCategory::GameplayError),
                };
                // The comparator already encodes severity policy for
                // discrepancies; keep its tag instead of recomputing
                self.build_issue(
                    issue_type,
                    category,
                    d.description.clone(),
                    d.location.unwrap_or((0, 0)),
                    d.confidence,
                    Some(d.severity),
                )
            })
            .collect()
    }

    fn build_issue(
        &self,
        issue_type: &str,
        category: IssueCategory,
        description: String,
        location: (i32, i32),
        confidence: f32,
        severity_override: Option<Severity>,
    ) -> ClassifiedIssue {
        let severity =
            severity_override.unwrap_or_else(|| self.compute_severity(confidence, category));
        let now = Local::now();
        ClassifiedIssue {
            issue_id: Uuid::new_v4().to_string(),
            issue_type: issue_type.to_string(),
            severity,
            category,
            description,
            location,
            confidence: confidence.clamp(0.0, 1.0),
            suggested_fix: suggested_fix(category, issue_type).to_string(),
            affected_components: affected_components(issue_type),
            frequency: 1,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Severity from confidence weighted by category: gameplay errors
    /// outrank cosmetic visual bugs at equal raw confidence.
    fn compute_severity(&self, confidence: f32, category: IssueCategory) -> Severity {
        let weight = match category {
            IssueCategory::VisualBug => self.config.weight_visual_bug,
            IssueCategory::UiProblem => self.config.weight_ui_problem,
            IssueCategory::GameplayError => self.config.weight_gameplay_error,
            IssueCategory::PerformanceIssue => self.config.weight_performance_issue,
        };
        let weighted = confidence.clamp(0.0, 1.0) * weight;
        if weighted >= self.config.critical_threshold {
            Severity::Critical
        } else if weighted >= self.config.high_threshold {
            Severity::High
        } else if weighted >= self.config.medium_threshold {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    fn summarize(&self, issues: &[ClassifiedIssue]) -> IssueSummary {
        let by_category = count_by(issues, |i| i.category.as_str().to_string());
        let by_severity = count_by(issues, |i| i.severity.as_str().to_string());
        let by_type = count_by(issues, |i| i.issue_type.clone());

        let top_issues: Vec<(String, u64)> = self
            .history
            .most_frequent(5)
            .into_iter()
            .map(|r| (r.issue_type.clone(), r.occurrences))
            .collect();

        IssueSummary {
            total_issues: issues.len(),
            recommendations: self.recommendations(issues),
            by_category,
            by_severity,
            by_type,
            top_issues,
        }
    }

    fn recommendations(&self, issues: &[ClassifiedIssue]) -> Vec<String> {
        if issues.is_empty() {
            return vec!["No critical issues detected in this pass.".to_string()];
        }

        let mut recommendations = Vec::new();
        let categories = [
            IssueCategory::VisualBug,
            IssueCategory::UiProblem,
            IssueCategory::GameplayError,
            IssueCategory::PerformanceIssue,
        ];
        for category in categories {
            let in_category: Vec<&ClassifiedIssue> =
                issues.iter().filter(|i| i.category == category).collect();
            if in_category.is_empty() {
                continue;
            }
            let critical = in_category
                .iter()
                .filter(|i| i.severity == Severity::Critical)
                .count();
            let high = in_category
                .iter()
                .filter(|i| i.severity == Severity::High)
                .count();
            if critical > 0 {
                recommendations.push(format!(
                    "URGENT: {} critical {} issue(s) need immediate attention.",
                    critical,
                    category.as_str()
                ));
            } else if high > 2 {
                recommendations.push(format!(
                    "Priority: {} high-severity {} issues this pass.",
                    high,
                    category.as_str()
                ));
            }
        }

        if recommendations.is_empty() {
            if let Some(top) = self.history.most_frequent(1).first() {
                if top.occurrences > 2 {
                    recommendations.push(format!(
                        "Investigate recurring {} ({} occurrences so far).",
                        top.issue_type, top.occurrences
                    ));
                }
            }
        }
        if recommendations.is_empty() {
            recommendations.push("Review the reported issues at normal priority.".to_string());
        }
        recommendations
    }
}

/// Static fix lookup. Illustrative, not exhaustive: unknown combinations
/// get a generic message.
fn suggested_fix(category: IssueCategory, issue_type: &str) -> &'static str {
    match (category, issue_type) {
        (IssueCategory::VisualBug, "screen_tearing") => {
            "Enable vsync or check frame pacing in the presentation path."
        }
        (IssueCategory::VisualBug, "blurry_rendering") => {
            "Check render scale and texture streaming; verify the camera focus state."
        }
        (IssueCategory::VisualBug, "oversharpened_rendering") => {
            "Reduce the sharpening post-process strength."
        }
        (IssueCategory::VisualBug, "color_anomaly") => {
            "Inspect material and post-process color grading for out-of-range values."
        }
        (IssueCategory::UiProblem, "missing_ui_element") => {
            "Verify the HUD widget is spawned and visible for this game state."
        }
        (IssueCategory::UiProblem, "misplaced_ui_element") => {
            "Check anchor and resolution-scaling rules for the widget."
        }
        (IssueCategory::UiProblem, "missing_text") => {
            "Verify the text binding and localization key resolve for this state."
        }
        (IssueCategory::UiProblem, "misplaced_text") => {
            "Check text-block anchoring and layout at this resolution."
        }
        (IssueCategory::UiProblem, "low_ocr_confidence") => {
            "Increase text contrast or font size; small translucent text reads poorly."
        }
        (IssueCategory::UiProblem, "possible_text_cutoff") => {
            "Widen the text container or enable wrapping/ellipsis handling."
        }
        (IssueCategory::GameplayError, "object_count_mismatch") => {
            "Check spawner logic and despawn conditions for this entity class."
        }
        (IssueCategory::GameplayError, "missing_critical_element") => {
            "Critical HUD element absent; verify HUD initialization for this mode."
        }
        _ => "Investigate further; no canned fix is recorded for this issue type.",
    }
}

/// Static subsystem mapping. Unknown issue types map to ["unknown"].
fn affected_components(issue_type: &str) -> Vec<String> {
    let tags: &[&str] = match issue_type {
        "screen_tearing" => &["renderer", "gpu_driver"],
        "blurry_rendering" | "oversharpened_rendering" => &["renderer", "post_processing"],
        "color_anomaly" => &["renderer", "materials"],
        "missing_ui_element" | "missing_critical_element" => &["ui_layer", "hud"],
        "misplaced_ui_element" | "possible_text_cutoff" => &["ui_layer", "layout"],
        "missing_text" | "misplaced_text" => &["ui_layer", "localization"],
        "low_ocr_confidence" => &["ui_layer", "fonts"],
        "object_count_mismatch" => &["gameplay", "spawner"],
        _ => &["unknown"],
    };
    tags.iter().map(|t| t.to_string()).collect()
}

fn count_by<F>(issues: &[ClassifiedIssue], key: F) -> HashMap<String, usize>
where
    F: Fn(&ClassifiedIssue) -> String,
{
    let mut counts = HashMap::new();
    for issue in issues {
        *counts.entry(key(issue)).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn artifact(artifact_type: &str, location: (i32, i32), severity: f32) -> VisualArtifact {
        VisualArtifact {
            artifact_type: artifact_type.to_string(),
            severity,
            location,
            description: format!("{} artifact", artifact_type),
            confidence: severity,
        }
    }

    fn classifier() -> IssueClassifier {
        IssueClassifier::new(IssueConfig::default())
    }

    #[test]
    fn test_tearing_maps_to_screen_tearing() {
        let mut classifier = classifier();
        let input = ClassifierInput {
            visual_artifacts: vec![artifact("tearing", (0, 100), 0.9)],
            ..ClassifierInput::default()
        };
        let result = classifier.classify(&input, None);
        assert_eq!(result.classified_issues.len(), 1);
        let issue = &result.classified_issues[0];
        assert_eq!(issue.issue_type, "screen_tearing");
        assert_eq!(issue.category, IssueCategory::VisualBug);
        assert!(issue.affected_components.contains(&"renderer".to_string()));
    }

    #[test]
    fn test_history_dedup_counts_repeats() {
        let mut classifier = classifier();
        let input = ClassifierInput {
            visual_artifacts: vec![artifact("tearing", (0, 100), 0.9)],
            ..ClassifierInput::default()
        };
        for expected in 1..=5u64 {
            let result = classifier.classify(&input, None);
            assert_eq!(result.classified_issues[0].frequency, expected);
        }
        let record = classifier.history().get("screen_tearing", (0, 100)).unwrap();
        assert_eq!(record.occurrences, 5);
        assert_eq!(record.severity_trend.len(), 5);
    }

    #[test]
    fn test_same_type_different_location_tracked_separately() {
        let mut classifier = classifier();
        classifier.classify(
            &ClassifierInput {
                visual_artifacts: vec![artifact("tearing", (0, 100), 0.9)],
                ..ClassifierInput::default()
            },
            None,
        );
        classifier.classify(
            &ClassifierInput {
                visual_artifacts: vec![artifact("tearing", (0, 500), 0.9)],
                ..ClassifierInput::default()
            },
            None,
        );
        assert_eq!(classifier.history().len(), 2);
    }

    #[test]
    fn test_low_ocr_confidence_synthesized() {
        let mut classifier = classifier();
        let input = ClassifierInput {
            text_elements: vec![TextElement {
                text: "blurry".to_string(),
                bounds: Rect::new(10, 10, 50, 20),
                confidence: 20.0,
                text_type: "general_text".to_string(),
                is_numeric: false,
                is_ui_element: false,
            }],
            ..ClassifierInput::default()
        };
        let result = classifier.classify(&input, None);
        assert!(result
            .classified_issues
            .iter()
            .any(|i| i.issue_type == "low_ocr_confidence"));
    }

    #[test]
    fn test_text_cutoff_heuristic() {
        let mut classifier = classifier();
        let make = |text: &str, x: i32| TextElement {
            text: text.to_string(),
            bounds: Rect::new(x, 50, 40, 20),
            confidence: 90.0,
            text_type: "general_text".to_string(),
            is_numeric: false,
            is_ui_element: false,
        };
        let input = ClassifierInput {
            text_elements: vec![make("inven-", 10), make("tory", 52)],
            ..ClassifierInput::default()
        };
        let result = classifier.classify(&input, None);
        let cutoff = result
            .classified_issues
            .iter()
            .find(|i| i.issue_type == "possible_text_cutoff")
            .unwrap();
        assert_eq!(cutoff.severity, Severity::Low);
    }

    #[test]
    fn test_discrepancy_severity_preserved() {
        let mut classifier = classifier();
        let input = ClassifierInput {
            state_discrepancies: vec![StateDiscrepancy {
                discrepancy_type: "missing_critical_element".to_string(),
                severity: Severity::Critical,
                expected: "minimap".to_string(),
                actual: "not found".to_string(),
                location: None,
                description: "Critical UI element 'minimap' is missing".to_string(),
                confidence: 0.9,
                element_type: "critical_ui".to_string(),
            }],
            ..ClassifierInput::default()
        };
        let result = classifier.classify(&input, None);
        let issue = &result.classified_issues[0];
        assert_eq!(issue.severity, Severity::Critical);
        assert_eq!(issue.category, IssueCategory::GameplayError);
        assert_eq!(result.severity_counts.get("critical"), Some(&1));
    }

    #[test]
    fn test_empty_input_gives_no_issues_recommendation() {
        let mut classifier = classifier();
        let result = classifier.classify(&ClassifierInput::default(), None);
        assert!(result.classified_issues.is_empty());
        assert_eq!(result.summary.recommendations.len(), 1);
        assert!(result.summary.recommendations[0].contains("No critical issues"));
    }

    #[test]
    fn test_urgent_recommendation_on_critical() {
        let mut classifier = classifier();
        let input = ClassifierInput {
            state_discrepancies: vec![StateDiscrepancy {
                discrepancy_type: "missing_critical_element".to_string(),
                severity: Severity::Critical,
                expected: "health_bar".to_string(),
                actual: "not found".to_string(),
                location: Some((20, 20)),
                description: "missing".to_string(),
                confidence: 0.9,
                element_type: "critical_ui".to_string(),
            }],
            ..ClassifierInput::default()
        };
        let result = classifier.classify(&input, None);
        assert!(result
            .summary
            .recommendations
            .iter()
            .any(|r| r.starts_with("URGENT")));
    }

    #[test]
    fn test_unknown_issue_type_components_default() {
        assert_eq!(affected_components("mystery"), vec!["unknown".to_string()]);
    }

    #[test]
    fn test_severity_weighting_by_category() {
        let classifier = classifier();
        // Same confidence, heavier category escalates
        let visual = classifier.compute_severity(0.82, IssueCategory::VisualBug);
        let gameplay = classifier.compute_severity(0.82, IssueCategory::GameplayError);
        assert_eq!(visual, Severity::High); // 0.82 * 0.8 = 0.656
        assert_eq!(gameplay, Severity::Critical); // 0.82 * 1.0 = 0.82
    }
}
