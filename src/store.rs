//! JSON persistence for analyses and reports.
//!
//! Each pipeline run writes one `analysis_<id>.json` per frame and
//! `report_<id>.json` per generated report into the configured output
//! directory. Ids embed a timestamp so a directory listing sorts
//! chronologically, plus a UUID suffix so two frames in the same second
//! never collide.

use anyhow::{Context, Result};
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::StoreConfig;

const ANALYSIS_PREFIX: &str = "analysis_";
const REPORT_PREFIX: &str = "report_";

/// Filesystem-backed result store rooted at one output directory.
pub struct ResultStore {
    out_dir: PathBuf,
}

impl ResultStore {
    /// Opens (and creates if needed) the store directory.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.out_dir).with_context(|| {
            format!("Failed to create result directory {}", config.out_dir.display())
        })?;
        Ok(Self {
            out_dir: config.out_dir.clone(),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Generates a new record id: local timestamp plus a short UUID tail.
    pub fn new_id() -> String {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let tail = Uuid::new_v4().simple().to_string();
        format!("{}_{}", stamp, &tail[..8])
    }

    pub fn save_analysis<T: Serialize>(&self, id: &str, analysis: &T) -> Result<PathBuf> {
        self.save(&format!("{}{}.json", ANALYSIS_PREFIX, id), analysis)
    }

    pub fn load_analysis<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        self.load(&format!("{}{}.json", ANALYSIS_PREFIX, id))
    }

    pub fn save_report<T: Serialize>(&self, id: &str, report: &T) -> Result<PathBuf> {
        self.save(&format!("{}{}.json", REPORT_PREFIX, id), report)
    }

    pub fn load_report<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        self.load(&format!("{}{}.json", REPORT_PREFIX, id))
    }

    /// All stored analysis ids, oldest first (ids sort chronologically).
    pub fn analysis_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.out_dir)
            .with_context(|| format!("Failed to read {}", self.out_dir.display()))?
        {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name
                .strip_prefix(ANALYSIS_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Pages through stored analysis ids, optionally keeping only analyses
    /// that contain at least one issue of the given type. The filter is
    /// applied before pagination.
    pub fn list_analyses(
        &self,
        offset: usize,
        limit: usize,
        issue_type: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut ids = self.analysis_ids()?;
        if let Some(wanted) = issue_type {
            let mut kept = Vec::new();
            for id in ids {
                let value: serde_json::Value = self.load_analysis(&id)?;
                if analysis_mentions_issue(&value, wanted) {
                    kept.push(id);
                }
            }
            ids = kept;
        }
        Ok(ids.into_iter().skip(offset).take(limit).collect())
    }

    fn save<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.out_dir.join(file_name);
        let json = serde_json::to_string_pretty(value).context("Failed to serialize record")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("Stored {}", path.display());
        Ok(path)
    }

    fn load<T: DeserializeOwned>(&self, file_name: &str) -> Result<T> {
        let path = self.out_dir.join(file_name);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// True if any `classified_issues[*].issue_type` in the record equals
/// `wanted`.
fn analysis_mentions_issue(value: &serde_json::Value, wanted: &str) -> bool {
    value
        .get("classified_issues")
        .and_then(|v| v.as_array())
        .is_some_and(|issues| {
            issues.iter().any(|issue| {
                issue.get("issue_type").and_then(|t| t.as_str()) == Some(wanted)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(dir: &Path) -> ResultStore {
        ResultStore::new(&StoreConfig {
            out_dir: dir.to_path_buf(),
        })
        .unwrap()
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let record = json!({"success": true, "classified_issues": []});
        store.save_analysis("20260101_000000_abcd1234", &record).unwrap();
        let loaded: serde_json::Value =
            store.load_analysis("20260101_000000_abcd1234").unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ResultStore::new_id();
        let b = ResultStore::new_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_listing_pagination() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for i in 0..5 {
            let id = format!("20260101_00000{}_aaaa0000", i);
            store.save_analysis(&id, &json!({"classified_issues": []})).unwrap();
        }
        let page = store.list_analyses(1, 2, None).unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].starts_with("20260101_000001"));
    }

    #[test]
    fn test_listing_issue_type_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .save_analysis(
                "20260101_000000_aaaa0000",
                &json!({"classified_issues": [{"issue_type": "screen_tearing"}]}),
            )
            .unwrap();
        store
            .save_analysis(
                "20260101_000001_bbbb0000",
                &json!({"classified_issues": [{"issue_type": "missing_text"}]}),
            )
            .unwrap();

        let tearing = store
            .list_analyses(0, 10, Some("screen_tearing"))
            .unwrap();
        assert_eq!(tearing, vec!["20260101_000000_aaaa0000".to_string()]);
    }

    #[test]
    fn test_reports_do_not_appear_in_analysis_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save_report("r1", &json!({"total_frames": 0})).unwrap();
        assert!(store.analysis_ids().unwrap().is_empty());
    }
}
