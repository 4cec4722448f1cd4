//! Pipeline orchestrator.
//!
//! Runs the analysis stages in order for each frame — visual, text, objects,
//! state comparison when an expected state is supplied, then issue
//! classification — persists the combined record, keeps running statistics,
//! and fires alert callbacks when a frame produces critical issues.

pub mod queue;

pub use queue::{FrameJob, PipelineWorker};

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::compare::{ExpectedGameState, StateComparator, StateComparison};
use crate::config::PipelineConfig;
use crate::frame::Frame;
use crate::issues::{ClassifiedIssue, ClassifierInput, IssueClassifier, IssueSummary};
use crate::objects::{ObjectAnalysis, ObjectDetectionBackend, ObjectDetector};
use crate::store::ResultStore;
use crate::text::{TextAnalysis, TextRecognizer};
use crate::visual::{VisualAnalysis, VisualAnalyzer};
use crate::Severity;

/// Complete record for one processed frame. This is what gets persisted as
/// `analysis_<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub frame_id: String,
    pub captured_at: DateTime<Local>,
    /// Capture metadata passed through from the frame
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// False when a stage or persistence failed; `error` says which
    pub success: bool,
    pub error: Option<String>,
    pub visual: VisualAnalysis,
    pub text: TextAnalysis,
    pub objects: ObjectAnalysis,
    /// Present only when an expected state was supplied
    pub state: Option<StateComparison>,
    pub classified_issues: Vec<ClassifiedIssue>,
    pub summary: IssueSummary,
    pub processing_ms: f64,
}

impl FrameAnalysis {
    pub fn critical_count(&self) -> usize {
        self.classified_issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count()
    }
}

/// Aggregate over a set of stored analyses, persisted as
/// `report_<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub report_id: String,
    pub generated_at: DateTime<Local>,
    pub total_frames: usize,
    /// Frames whose analysis did not complete cleanly
    pub failed_frames: usize,
    /// Frames whose state comparison passed (or had no expected state)
    pub valid_frames: usize,
    pub total_issues: usize,
    pub critical_total: usize,
    pub issues_by_severity: HashMap<String, usize>,
    pub issues_by_category: HashMap<String, usize>,
    /// Deduplicated across all frames, first occurrence order
    pub recommendations: Vec<String>,
    pub average_processing_ms: f64,
    pub frame_ids: Vec<String>,
}

/// Running pipeline statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub average_processing_ms: f64,
}

type AlertCallback = Box<dyn Fn(&FrameAnalysis) + Send>;

/// The orchestrator. Owns every stage plus the result store; one instance
/// per frame stream, calls serialized by the caller (the worker queue in
/// [`queue`] does exactly that).
pub struct Pipeline {
    config: PipelineConfig,
    visual: VisualAnalyzer,
    text: TextRecognizer,
    objects: ObjectDetector,
    comparator: StateComparator,
    classifier: IssueClassifier,
    store: ResultStore,
    stats: PipelineStats,
    alert_callbacks: Vec<AlertCallback>,
}

impl Pipeline {
    /// Builds a pipeline with the default backends: Tesseract OCR if the
    /// executable is present, the blob detector for objects.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let visual = VisualAnalyzer::new(config.visual.clone(), config.preprocess.clone());
        let text = TextRecognizer::new(config.text.clone(), config.preprocess.clone());
        let objects = ObjectDetector::new(config.objects.clone(), None);
        Self::assemble(config, visual, text, objects)
    }

    /// Builds a pipeline around caller-supplied stages. This is how tests
    /// and deployments with a real detection model inject backends.
    pub fn with_components(
        config: PipelineConfig,
        visual: VisualAnalyzer,
        text: TextRecognizer,
        object_backend: Box<dyn ObjectDetectionBackend>,
    ) -> Result<Self> {
        config.validate()?;
        let objects = ObjectDetector::new(config.objects.clone(), Some(object_backend));
        Self::assemble(config, visual, text, objects)
    }

    fn assemble(
        config: PipelineConfig,
        visual: VisualAnalyzer,
        text: TextRecognizer,
        objects: ObjectDetector,
    ) -> Result<Self> {
        let store = ResultStore::new(&config.store)?;
        Ok(Self {
            comparator: StateComparator::new(config.compare.clone()),
            classifier: IssueClassifier::new(config.issues.clone()),
            visual,
            text,
            objects,
            store,
            config,
            stats: PipelineStats::default(),
            alert_callbacks: Vec::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn visual_mut(&mut self) -> &mut VisualAnalyzer {
        &mut self.visual
    }

    pub fn objects_mut(&mut self) -> &mut ObjectDetector {
        &mut self.objects
    }

    pub fn classifier(&self) -> &IssueClassifier {
        &self.classifier
    }

    /// Registers a callback fired after any frame that produced at least
    /// one critical issue. A panicking callback is contained and logged;
    /// it cannot take the pipeline down.
    pub fn add_alert_callback(&mut self, callback: AlertCallback) {
        self.alert_callbacks.push(callback);
    }

    /// Runs all stages for one frame, persists the record, and returns it.
    ///
    /// Analysis stages cannot fail; a persistence failure is recorded in
    /// the returned record (`success` false, `error` set) rather than
    /// propagated, so a full disk does not stop the stream.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        expected: Option<&ExpectedGameState>,
    ) -> FrameAnalysis {
        let started = Instant::now();
        let frame_id = ResultStore::new_id();

        let visual = self.visual.analyze(frame);
        let text = self.text.recognize(frame);
        let objects = self.objects.detect(frame);

        let state = expected.map(|expected| {
            self.comparator.compare(
                &visual.ui_elements,
                &text.text_elements,
                &objects.detected_objects,
                expected,
                (frame.width(), frame.height()),
            )
        });

        let input = ClassifierInput {
            visual_artifacts: visual.visual_artifacts.clone(),
            text_elements: text.text_elements.clone(),
            state_discrepancies: state
                .as_ref()
                .map(|s| s.discrepancies.clone())
                .unwrap_or_default(),
        };
        let classification = self.classifier.classify(&input, Some(&frame_id));

        let mut analysis = FrameAnalysis {
            frame_id,
            captured_at: frame.captured_at,
            metadata: frame.metadata.clone(),
            success: true,
            error: None,
            visual,
            text,
            objects,
            state,
            classified_issues: classification.classified_issues,
            summary: classification.summary,
            processing_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        if let Err(e) = self.store.save_analysis(&analysis.frame_id, &analysis) {
            log::error!("Failed to persist analysis {}: {}", analysis.frame_id, e);
            analysis.success = false;
            analysis.error = Some(e.to_string());
        }

        self.update_stats(analysis.processing_ms);
        self.fire_alerts(&analysis);
        analysis
    }

    fn update_stats(&mut self, processing_ms: f64) {
        let n = self.stats.frames_processed + 1;
        self.stats.average_processing_ms = (self.stats.average_processing_ms
            * self.stats.frames_processed as f64
            + processing_ms)
            / n as f64;
        self.stats.frames_processed = n;
    }

    fn fire_alerts(&self, analysis: &FrameAnalysis) {
        if analysis.critical_count() == 0 {
            return;
        }
        log::warn!(
            "Frame {} produced {} critical issue(s)",
            analysis.frame_id,
            analysis.critical_count()
        );
        for callback in &self.alert_callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(analysis))).is_err() {
                log::error!("Alert callback panicked for frame {}", analysis.frame_id);
            }
        }
    }

    /// Aggregates stored analyses into a report and persists it.
    ///
    /// `frame_ids` selects a subset; `None` aggregates every stored
    /// analysis.
    pub fn generate_report(&self, frame_ids: Option<&[String]>) -> Result<VerificationReport> {
        let ids: Vec<String> = match frame_ids {
            Some(ids) => ids.to_vec(),
            None => self.store.analysis_ids()?,
        };

        let mut report = VerificationReport {
            report_id: ResultStore::new_id(),
            generated_at: Local::now(),
            total_frames: ids.len(),
            failed_frames: 0,
            valid_frames: 0,
            total_issues: 0,
            critical_total: 0,
            issues_by_severity: HashMap::new(),
            issues_by_category: HashMap::new(),
            recommendations: Vec::new(),
            average_processing_ms: 0.0,
            frame_ids: ids.clone(),
        };

        let mut total_ms = 0.0;
        let mut loaded = 0usize;
        for id in &ids {
            // A missing or corrupt record counts as a failed frame; the
            // rest of the batch still aggregates
            let analysis: FrameAnalysis = match self.store.load_analysis(id) {
                Ok(analysis) => analysis,
                Err(e) => {
                    log::warn!("Skipping unloadable analysis {}: {}", id, e);
                    report.failed_frames += 1;
                    continue;
                }
            };
            loaded += 1;
            if !analysis.success {
                report.failed_frames += 1;
            }
            if analysis.state.as_ref().is_none_or(|s| s.is_valid) {
                report.valid_frames += 1;
            }
            report.total_issues += analysis.classified_issues.len();
            report.critical_total += analysis.critical_count();
            for issue in &analysis.classified_issues {
                *report
                    .issues_by_severity
                    .entry(issue.severity.as_str().to_string())
                    .or_insert(0) += 1;
                *report
                    .issues_by_category
                    .entry(issue.category.as_str().to_string())
                    .or_insert(0) += 1;
            }
            for rec in &analysis.summary.recommendations {
                if !report.recommendations.contains(rec) {
                    report.recommendations.push(rec.clone());
                }
            }
            total_ms += analysis.processing_ms;
        }
        if loaded > 0 {
            report.average_processing_ms = total_ms / loaded as f64;
        }

        self.store.save_report(&report.report_id, &report)?;
        log::info!(
            "Report {}: {} frames, {} issues, {} critical",
            report.report_id,
            report.total_frames,
            report.total_issues,
            report.critical_total
        );
        Ok(report)
    }

    /// Clears all cross-frame state: tracking, transition baseline, issue
    /// history, statistics. Stored results are untouched.
    pub fn reset(&mut self) {
        self.visual.reset();
        self.objects.reset();
        self.classifier.history_mut().clear();
        self.stats = PipelineStats::default();
    }
}
