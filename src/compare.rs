//! State comparator: validates observed frame content against an expected
//! game state and emits severity-tagged discrepancies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::CompareConfig;
use crate::geometry::distance;
use crate::objects::DetectedObject;
use crate::text::TextElement;
use crate::visual::UiElement;
use crate::Severity;

/// Caller-supplied ground truth for one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedGameState {
    pub ui_elements: Vec<ExpectedUiElement>,
    pub text_elements: Vec<ExpectedText>,
    /// Object class -> expected count
    pub object_counts: HashMap<String, usize>,
    /// Opaque state blobs, compared by presence only
    pub player_state: Option<serde_json::Value>,
    pub mission_state: Option<serde_json::Value>,
    pub inventory_state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedUiElement {
    pub element_type: String,
    pub position: (i32, i32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedText {
    pub text: String,
    pub position: (i32, i32),
}

/// One expected-vs-observed mismatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDiscrepancy {
    /// missing_ui_element, ui_position_mismatch, missing_text,
    /// text_position_mismatch, object_count_mismatch or
    /// missing_critical_element
    pub discrepancy_type: String,
    pub severity: Severity,
    pub expected: String,
    pub actual: String,
    pub location: Option<(i32, i32)>,
    pub description: String,
    pub confidence: f32,
    /// ui, text, object or critical_ui
    pub element_type: String,
}

/// Result of one comparison pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateComparison {
    /// True when no critical or high discrepancies were found
    pub is_valid: bool,
    pub discrepancies: Vec<StateDiscrepancy>,
    /// 1 minus the mean severity weight across discrepancies; 1.0 when clean
    pub overall_confidence: f32,
    pub critical_issues: usize,
    pub warnings: usize,
}

/// Compares extracted frame state against expected state.
pub struct StateComparator {
    config: CompareConfig,
}

impl StateComparator {
    pub fn new(config: CompareConfig) -> Self {
        Self { config }
    }

    /// Runs all validation passes for one frame.
    ///
    /// `frame_size` is needed by the positional heuristics for critical
    /// elements (bars near the top-left, minimap near the bottom-right).
    pub fn compare(
        &self,
        ui_elements: &[UiElement],
        text_elements: &[TextElement],
        objects: &[DetectedObject],
        expected: &ExpectedGameState,
        frame_size: (u32, u32),
    ) -> StateComparison {
        let mut discrepancies = Vec::new();
        discrepancies.extend(self.validate_ui_elements(ui_elements, expected));
        discrepancies.extend(self.validate_text(text_elements, expected));
        discrepancies.extend(self.validate_object_counts(objects, expected));
        discrepancies.extend(self.validate_critical_elements(ui_elements, text_elements, frame_size));
        summarize(discrepancies)
    }

    /// Checks that each expected UI element exists with roughly the right
    /// position.
    ///
    /// When several detected elements share the expected type, the nearest
    /// by Euclidean distance is the one checked against tolerance. With
    /// legitimate duplicates (two health bars for two players) this can
    /// compare against the wrong instance; the ambiguity is inherited from
    /// the original design and left as-is.
    fn validate_ui_elements(
        &self,
        detected: &[UiElement],
        expected: &ExpectedGameState,
    ) -> Vec<StateDiscrepancy> {
        let mut discrepancies = Vec::new();
        let tolerance = self.config.position_tolerance;

        for exp in &expected.ui_elements {
            let candidates: Vec<&UiElement> = detected
                .iter()
                .filter(|e| e.element_type == exp.element_type)
                .collect();

            if candidates.is_empty() {
                discrepancies.push(StateDiscrepancy {
                    discrepancy_type: "missing_ui_element".to_string(),
                    severity: Severity::High,
                    expected: exp.element_type.clone(),
                    actual: "not found".to_string(),
                    location: Some(exp.position),
                    description: format!(
                        "Expected {} at ({}, {}) was not detected",
                        exp.element_type, exp.position.0, exp.position.1
                    ),
                    confidence: 0.8,
                    element_type: "ui".to_string(),
                });
                continue;
            }

            let expected_pos = (exp.position.0 as f32, exp.position.1 as f32);
            let nearest = candidates
                .iter()
                .min_by(|a, b| {
                    let da = distance((a.bounds.x as f32, a.bounds.y as f32), expected_pos);
                    let db = distance((b.bounds.x as f32, b.bounds.y as f32), expected_pos);
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap();

            let dx = (nearest.bounds.x - exp.position.0).abs();
            let dy = (nearest.bounds.y - exp.position.1).abs();
            // Inclusive boundary: exactly at tolerance passes
            if dx > tolerance || dy > tolerance {
                discrepancies.push(StateDiscrepancy {
                    discrepancy_type: "ui_position_mismatch".to_string(),
                    severity: Severity::Medium,
                    expected: format!("({}, {})", exp.position.0, exp.position.1),
                    actual: format!("({}, {})", nearest.bounds.x, nearest.bounds.y),
                    location: Some((nearest.bounds.x, nearest.bounds.y)),
                    description: format!(
                        "{} off by ({}, {}) px, tolerance {}",
                        exp.element_type, dx, dy, tolerance
                    ),
                    confidence: nearest.confidence,
                    element_type: "ui".to_string(),
                });
            }
        }

        discrepancies
    }

    /// Checks that each expected text entry was recognized somewhere near
    /// its expected location.
    fn validate_text(
        &self,
        detected: &[TextElement],
        expected: &ExpectedGameState,
    ) -> Vec<StateDiscrepancy> {
        let mut discrepancies = Vec::new();

        for exp in &expected.text_elements {
            let matches: Vec<&TextElement> = detected
                .iter()
                .filter(|e| text_similarity(&exp.text, &e.text) >= self.config.text_match_threshold)
                .collect();

            if matches.is_empty() {
                discrepancies.push(StateDiscrepancy {
                    discrepancy_type: "missing_text".to_string(),
                    severity: Severity::High,
                    expected: exp.text.clone(),
                    actual: "not found".to_string(),
                    location: Some(exp.position),
                    description: format!("Expected text '{}' was not recognized", exp.text),
                    confidence: 0.7,
                    element_type: "text".to_string(),
                });
                continue;
            }

            let tolerance = self.config.position_tolerance;
            let in_position = matches.iter().any(|m| {
                (m.bounds.x - exp.position.0).abs() <= tolerance
                    && (m.bounds.y - exp.position.1).abs() <= tolerance
            });
            if !in_position {
                let nearest = matches[0];
                discrepancies.push(StateDiscrepancy {
                    discrepancy_type: "text_position_mismatch".to_string(),
                    severity: Severity::Medium,
                    expected: format!("({}, {})", exp.position.0, exp.position.1),
                    actual: format!("({}, {})", nearest.bounds.x, nearest.bounds.y),
                    location: Some((nearest.bounds.x, nearest.bounds.y)),
                    description: format!(
                        "Text '{}' found away from its expected location",
                        exp.text
                    ),
                    confidence: nearest.confidence / 100.0,
                    element_type: "text".to_string(),
                });
            }
        }

        discrepancies
    }

    /// Checks detected object counts per class against expectations.
    fn validate_object_counts(
        &self,
        objects: &[DetectedObject],
        expected: &ExpectedGameState,
    ) -> Vec<StateDiscrepancy> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for object in objects {
            *counts.entry(object.class_name.as_str()).or_insert(0) += 1;
        }

        let mut discrepancies = Vec::new();
        for (class, &expected_count) in &expected.object_counts {
            let detected_count = counts.get(class.as_str()).copied().unwrap_or(0);
            let tolerance = ((expected_count as f32 * self.config.count_tolerance).round() as usize)
                .max(1);
            let diff = expected_count.abs_diff(detected_count);
            if diff > tolerance {
                let severity = if expected_count > 0 && detected_count == 0 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                discrepancies.push(StateDiscrepancy {
                    discrepancy_type: "object_count_mismatch".to_string(),
                    severity,
                    expected: expected_count.to_string(),
                    actual: detected_count.to_string(),
                    location: None,
                    description: format!(
                        "Expected {} '{}' objects, detected {}",
                        expected_count, class, detected_count
                    ),
                    confidence: 0.7,
                    element_type: "object".to_string(),
                });
            }
        }

        discrepancies
    }

    /// Checks that every configured critical element is present, by detected
    /// type, by text mention, or by positional heuristic. A missing critical
    /// element is always a critical discrepancy, regardless of how clean the
    /// rest of the frame is.
    fn validate_critical_elements(
        &self,
        ui_elements: &[UiElement],
        text_elements: &[TextElement],
        frame_size: (u32, u32),
    ) -> Vec<StateDiscrepancy> {
        let mut discrepancies = Vec::new();

        for name in &self.config.critical_elements {
            let found = self.critical_element_present(name, ui_elements, text_elements, frame_size);
            if !found {
                discrepancies.push(StateDiscrepancy {
                    discrepancy_type: "missing_critical_element".to_string(),
                    severity: Severity::Critical,
                    expected: name.clone(),
                    actual: "not found".to_string(),
                    location: None,
                    description: format!("Critical UI element '{}' is missing", name),
                    confidence: 0.9,
                    element_type: "critical_ui".to_string(),
                });
            }
        }

        discrepancies
    }

    fn critical_element_present(
        &self,
        name: &str,
        ui_elements: &[UiElement],
        text_elements: &[TextElement],
        (width, height): (u32, u32),
    ) -> bool {
        // Direct type match (e.g. a template named after the element)
        if ui_elements.iter().any(|e| e.element_type == name) {
            return true;
        }

        // Text mention: "Health" on screen implies the health bar area exists
        let spaced = name.replace('_', " ");
        let stem = name.split('_').next().unwrap_or(name);
        if text_elements.iter().any(|e| {
            let lower = e.text.to_lowercase();
            lower.contains(name) || lower.contains(&spaced) || lower.contains(stem)
        }) {
            return true;
        }

        let (width, height) = (width as f32, height as f32);
        if name.ends_with("_bar") {
            // Bars are wide rectangles in the top-left HUD area
            return ui_elements.iter().any(|e| {
                let (cx, cy) = e.bounds.center();
                e.element_type == "rectangle"
                    && e.aspect_ratio > 2.0
                    && cx < width * 0.4
                    && cy < height * 0.25
            });
        }
        if name == "minimap" {
            // Minimaps are square or circular, bottom-right corner
            return ui_elements.iter().any(|e| {
                let (cx, cy) = e.bounds.center();
                (e.element_type == "square" || e.element_type == "circular")
                    && cx > width * 0.7
                    && cy > height * 0.7
            });
        }

        false
    }

    /// Inverts observed extraction into an expected-state template, the
    /// baseline for future comparisons. Comparing a frame against its own
    /// freshly captured template yields zero discrepancies.
    pub fn create_template(
        &self,
        ui_elements: &[UiElement],
        text_elements: &[TextElement],
        objects: &[DetectedObject],
    ) -> ExpectedGameState {
        let mut object_counts: HashMap<String, usize> = HashMap::new();
        for object in objects {
            *object_counts.entry(object.class_name.clone()).or_insert(0) += 1;
        }

        ExpectedGameState {
            ui_elements: ui_elements
                .iter()
                .map(|e| ExpectedUiElement {
                    element_type: e.element_type.clone(),
                    position: (e.bounds.x, e.bounds.y),
                })
                .collect(),
            text_elements: text_elements
                .iter()
                .map(|e| ExpectedText {
                    text: e.text.clone(),
                    position: (e.bounds.x, e.bounds.y),
                })
                .collect(),
            object_counts,
            player_state: None,
            mission_state: None,
            inventory_state: None,
        }
    }
}

/// Similarity between expected and recognized text: exact match 1.0,
/// substring either way 0.9, otherwise Jaccard similarity over character
/// sets.
fn text_similarity(a: &str, b: &str) -> f32 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return 1.0;
    }
    if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
        return 0.9;
    }

    let set_a: std::collections::HashSet<char> = a.chars().collect();
    let set_b: std::collections::HashSet<char> = b.chars().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

fn summarize(discrepancies: Vec<StateDiscrepancy>) -> StateComparison {
    let critical_issues = discrepancies
        .iter()
        .filter(|d| d.severity == Severity::Critical)
        .count();
    let high = discrepancies
        .iter()
        .filter(|d| d.severity == Severity::High)
        .count();
    let warnings = discrepancies.len() - critical_issues - high;

    let overall_confidence = if discrepancies.is_empty() {
        1.0
    } else {
        let mean_weight: f32 = discrepancies.iter().map(|d| d.severity.weight()).sum::<f32>()
            / discrepancies.len() as f32;
        (1.0 - mean_weight).clamp(0.0, 1.0)
    };

    StateComparison {
        is_valid: critical_issues == 0 && high == 0,
        discrepancies,
        overall_confidence,
        critical_issues,
        warnings,
    }
}
