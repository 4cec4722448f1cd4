//! Persistent issue history.
//!
//! Recurring issues are tracked across frames by a key combining issue type
//! and pixel location: the same defect at a different spot is a different
//! tracked problem. Entries only grow while the process runs; export/import
//! carries them across restarts.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::Severity;

/// History record for one recurring issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub issue_type: String,
    pub category: String,
    pub occurrences: u64,
    pub first_seen: DateTime<Local>,
    pub last_seen: DateTime<Local>,
    /// Severity at each occurrence, oldest first
    pub severity_trend: Vec<(DateTime<Local>, Severity)>,
    /// Screenshot ids this issue appeared in
    pub affected_screenshots: Vec<String>,
}

/// History key: type plus location, so spatial position is part of issue
/// identity.
pub fn history_key(issue_type: &str, location: (i32, i32)) -> String {
    format!("{}_{}_{}", issue_type, location.0, location.1)
}

/// Map of history keys to records.
#[derive(Debug, Default)]
pub struct IssueHistory {
    entries: HashMap<String, IssueRecord>,
}

impl IssueHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence and returns the updated occurrence count.
    pub fn record(
        &mut self,
        issue_type: &str,
        category: &str,
        location: (i32, i32),
        severity: Severity,
        screenshot_id: Option<&str>,
    ) -> u64 {
        let now = Local::now();
        let entry = self
            .entries
            .entry(history_key(issue_type, location))
            .or_insert_with(|| IssueRecord {
                issue_type: issue_type.to_string(),
                category: category.to_string(),
                occurrences: 0,
                first_seen: now,
                last_seen: now,
                severity_trend: Vec::new(),
                affected_screenshots: Vec::new(),
            });

        entry.occurrences += 1;
        entry.last_seen = now;
        entry.severity_trend.push((now, severity));
        if let Some(id) = screenshot_id {
            entry.affected_screenshots.push(id.to_string());
        }
        entry.occurrences
    }

    pub fn get(&self, issue_type: &str, location: (i32, i32)) -> Option<&IssueRecord> {
        self.entries.get(&history_key(issue_type, location))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by occurrence count, most frequent first.
    pub fn most_frequent(&self, limit: usize) -> Vec<&IssueRecord> {
        let mut records: Vec<&IssueRecord> = self.entries.values().collect();
        records.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
        records.truncate(limit);
        records
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Writes the history as a keyed JSON map.
    pub fn export(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialize issue history")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write issue history to {}", path.display()))?;
        Ok(())
    }

    /// Replaces the current contents with a previously exported map.
    pub fn import(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read issue history from {}", path.display()))?;
        self.entries =
            serde_json::from_str(&contents).context("Failed to parse issue history")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurrences_grow_monotonically() {
        let mut history = IssueHistory::new();
        for i in 1..=4u64 {
            let count = history.record("screen_tearing", "visual_bug", (0, 100), Severity::High, None);
            assert_eq!(count, i);
        }
        let record = history.get("screen_tearing", (0, 100)).unwrap();
        assert_eq!(record.occurrences, 4);
        assert_eq!(record.severity_trend.len(), 4);
    }

    #[test]
    fn test_different_location_is_different_entry() {
        let mut history = IssueHistory::new();
        history.record("screen_tearing", "visual_bug", (0, 100), Severity::High, None);
        history.record("screen_tearing", "visual_bug", (0, 400), Severity::Low, None);
        assert_eq!(history.len(), 2);
        assert_eq!(history.get("screen_tearing", (0, 100)).unwrap().occurrences, 1);
    }

    #[test]
    fn test_export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = IssueHistory::new();
        history.record("missing_text", "ui_problem", (50, 60), Severity::Medium, Some("shot_1"));
        history.record("missing_text", "ui_problem", (50, 60), Severity::High, Some("shot_2"));
        history.export(&path).unwrap();

        let mut restored = IssueHistory::new();
        restored.import(&path).unwrap();
        let record = restored.get("missing_text", (50, 60)).unwrap();
        assert_eq!(record.occurrences, 2);
        assert_eq!(record.affected_screenshots, vec!["shot_1", "shot_2"]);
    }

    #[test]
    fn test_most_frequent_ordering() {
        let mut history = IssueHistory::new();
        for _ in 0..3 {
            history.record("a", "visual_bug", (0, 0), Severity::Low, None);
        }
        history.record("b", "visual_bug", (0, 0), Severity::Low, None);
        let top = history.most_frequent(5);
        assert_eq!(top[0].issue_type, "a");
        assert_eq!(top[0].occurrences, 3);
    }
}
