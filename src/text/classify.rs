//! Classification and line-merging of recognized text fragments.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::TextConfig;
use crate::geometry::Rect;

/// One recognized, classified text element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextElement {
    pub text: String,
    pub bounds: Rect,
    /// OCR engine confidence on its native 0-100 scale
    pub confidence: f32,
    /// numeric_value, ui_element, mission_text, status_text, resource_text,
    /// inventory_text or general_text
    pub text_type: String,
    pub is_numeric: bool,
    pub is_ui_element: bool,
}

/// Exact-match UI labels (compared lowercased).
const UI_LABELS: &[&str] = &[
    "ok", "cancel", "apply", "back", "next", "menu", "start", "exit", "yes", "no", "confirm",
    "close", "settings", "options", "resume", "quit",
];

fn numeric_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^\d+$",
            r"^\d+[.,]\d+$",
            r"^\d+%$",
            r"^\d+/\d+$",
            r"^\d+:\d+$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("numeric pattern"))
        .collect()
    })
}

fn ui_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Short all-caps strings are almost always button/label captions
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z][A-Z ]{1,11}$").expect("ui pattern"))
}

/// Classifies one recognized string into a text type.
pub fn classify_text(text: &str) -> &'static str {
    let trimmed = text.trim();
    if is_numeric(trimmed) {
        return "numeric_value";
    }

    let lower = trimmed.to_lowercase();
    if UI_LABELS.contains(&lower.as_str()) || ui_pattern().is_match(trimmed) {
        return "ui_element";
    }

    const BUCKETS: &[(&[&str], &str)] = &[
        (&["mission", "objective", "quest", "task"], "mission_text"),
        (&["health", "shield", "armor", "energy", "hull", "oxygen"], "status_text"),
        (&["credit", "money", "gold", "resource", "ore", "fuel"], "resource_text"),
        (&["inventory", "item", "equipment", "weapon", "cargo"], "inventory_text"),
    ];
    for (keywords, text_type) in BUCKETS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return text_type;
        }
    }

    "general_text"
}

/// Numeric if it matches a numeric pattern, or is all digits once the
/// common separators are stripped.
pub fn is_numeric(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if numeric_patterns().iter().any(|p| p.is_match(text)) {
        return true;
    }
    let stripped: String = text.chars().filter(|c| !",./:".contains(*c)).collect();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

/// Merge priority: higher wins when fragments combine.
fn type_priority(text_type: &str) -> u8 {
    match text_type {
        "mission_text" => 7,
        "status_text" => 6,
        "resource_text" => 5,
        "inventory_text" => 4,
        "ui_element" => 3,
        "numeric_value" => 2,
        _ => 1,
    }
}

/// Merges horizontally adjacent fragments on the same text line into one
/// logical element.
///
/// Fragments merge when their vertical overlap (relative to the shorter box)
/// exceeds the configured ratio and the horizontal gap is under the
/// configured limit. Merging concatenates text, unions the boxes, averages
/// confidence and keeps the highest-priority type. Running the pass over an
/// already-merged list is a no-op.
pub fn merge_text_elements(mut elements: Vec<TextElement>, config: &TextConfig) -> Vec<TextElement> {
    if elements.len() < 2 {
        return elements;
    }

    elements.sort_by_key(|e| (e.bounds.y, e.bounds.x));

    let mut merged: Vec<TextElement> = Vec::with_capacity(elements.len());
    let mut conf_sums: Vec<(f32, u32)> = Vec::with_capacity(elements.len());

    for element in elements {
        let mergeable = merged.last().is_some_and(|last| {
            last.bounds.vertical_overlap_ratio(&element.bounds) > config.merge_min_overlap
                && last.bounds.horizontal_gap(&element.bounds) < config.merge_max_gap
        });

        if mergeable {
            let last = merged.last_mut().unwrap();
            let (sum, count) = conf_sums.last_mut().unwrap();
            last.text.push(' ');
            last.text.push_str(&element.text);
            last.bounds = last.bounds.union(&element.bounds);
            *sum += element.confidence;
            *count += 1;
            last.confidence = *sum / *count as f32;
            if type_priority(&element.text_type) > type_priority(&last.text_type) {
                last.text_type = element.text_type;
            }
            last.is_numeric = last.text_type == "numeric_value";
            last.is_ui_element = last.text_type == "ui_element";
        } else {
            conf_sums.push((element.confidence, 1));
            merged.push(element);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(text: &str, x: i32, y: i32, w: u32, h: u32, conf: f32) -> TextElement {
        let text_type = classify_text(text).to_string();
        TextElement {
            text: text.to_string(),
            bounds: Rect::new(x, y, w, h),
            confidence: conf,
            is_numeric: text_type == "numeric_value",
            is_ui_element: text_type == "ui_element",
            text_type,
        }
    }

    #[test]
    fn test_classify_numeric() {
        assert_eq!(classify_text("12345"), "numeric_value");
        assert_eq!(classify_text("12,345"), "numeric_value");
        assert_eq!(classify_text("75%"), "numeric_value");
        assert_eq!(classify_text("3/5"), "numeric_value");
        assert_eq!(classify_text("12:30"), "numeric_value");
    }

    #[test]
    fn test_classify_ui_labels() {
        assert_eq!(classify_text("OK"), "ui_element");
        assert_eq!(classify_text("Cancel"), "ui_element");
        assert_eq!(classify_text("BACK"), "ui_element");
    }

    #[test]
    fn test_classify_keyword_buckets() {
        assert_eq!(classify_text("Mission: harvest 5 crops"), "mission_text");
        assert_eq!(classify_text("Shield integrity low"), "status_text");
        assert_eq!(classify_text("Credits earned"), "resource_text");
        assert_eq!(classify_text("Weapon slot 2"), "inventory_text");
        assert_eq!(classify_text("hello world"), "general_text");
    }

    #[test]
    fn test_merge_same_line() {
        let elements = vec![
            element("Mission", 10, 100, 60, 20, 90.0),
            element("complete", 75, 102, 70, 18, 80.0),
        ];
        let merged = merge_text_elements(elements, &TextConfig::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Mission complete");
        assert!((merged[0].confidence - 85.0).abs() < 0.001);
        assert_eq!(merged[0].text_type, "mission_text");
        assert_eq!(merged[0].bounds, Rect::new(10, 100, 135, 20));
    }

    #[test]
    fn test_no_merge_across_lines() {
        let elements = vec![
            element("first", 10, 100, 50, 20, 90.0),
            element("second", 10, 160, 50, 20, 90.0),
        ];
        let merged = merge_text_elements(elements, &TextConfig::default());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_no_merge_over_wide_gap() {
        let elements = vec![
            element("left", 10, 100, 40, 20, 90.0),
            element("right", 300, 100, 40, 20, 90.0),
        ];
        let merged = merge_text_elements(elements, &TextConfig::default());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let elements = vec![
            element("Shield", 10, 100, 50, 20, 90.0),
            element("80", 70, 100, 20, 20, 95.0),
            element("Cargo", 10, 200, 50, 20, 85.0),
        ];
        let config = TextConfig::default();
        let once = merge_text_elements(elements, &config);
        let twice = merge_text_elements(once.clone(), &config);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.bounds, b.bounds);
            assert!((a.confidence - b.confidence).abs() < 0.001);
        }
    }

    #[test]
    fn test_merged_type_keeps_priority() {
        // status_text outranks numeric_value
        let elements = vec![
            element("Health", 10, 100, 50, 20, 90.0),
            element("100", 70, 100, 30, 20, 95.0),
        ];
        let merged = merge_text_elements(elements, &TextConfig::default());
        assert_eq!(merged[0].text_type, "status_text");
    }
}
