//! Worker thread for asynchronous frame processing.
//!
//! Jobs go in through an mpsc channel, completed analyses come back out
//! through another. The worker polls with `recv_timeout` so a stop request
//! is noticed within one poll interval even when no jobs arrive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::compare::ExpectedGameState;
use crate::frame::Frame;
use crate::pipeline::{FrameAnalysis, Pipeline};

/// One queued unit of work.
pub struct FrameJob {
    pub frame: Frame,
    pub expected: Option<ExpectedGameState>,
}

/// Handle to a pipeline running on its own thread.
///
/// The worker owns the pipeline for its lifetime; `stop` hands it back so
/// the caller can inspect statistics or generate a report afterwards.
pub struct PipelineWorker {
    sender: Sender<FrameJob>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Pipeline>,
}

impl PipelineWorker {
    /// Spawns the worker thread. Returns the handle plus the receiver for
    /// completed analyses, in submission order.
    pub fn spawn(
        mut pipeline: Pipeline,
        poll_interval: Duration,
    ) -> (Self, Receiver<FrameAnalysis>) {
        let (sender, jobs) = mpsc::channel::<FrameJob>();
        let (results, results_rx) = mpsc::channel::<FrameAnalysis>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            log::info!("Pipeline worker started");
            loop {
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }
                match jobs.recv_timeout(poll_interval) {
                    Ok(job) => {
                        let analysis = pipeline.process_frame(&job.frame, job.expected.as_ref());
                        // A dropped receiver is not an error; the analysis
                        // is already persisted
                        if results.send(analysis).is_err() {
                            log::debug!("Result receiver dropped, continuing");
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            log::info!("Pipeline worker stopped");
            pipeline
        });

        (
            Self {
                sender,
                stop,
                handle,
            },
            results_rx,
        )
    }

    /// Queues one frame. Fails only if the worker thread is gone.
    pub fn submit(&self, frame: Frame, expected: Option<ExpectedGameState>) -> Result<()> {
        self.sender
            .send(FrameJob { frame, expected })
            .map_err(|_| anyhow!("Pipeline worker is no longer running"))
    }

    /// Stops the worker and returns the pipeline. Jobs already picked up
    /// finish; jobs still queued when the flag is noticed are dropped.
    pub fn stop(self) -> Result<Pipeline> {
        self.stop.store(true, Ordering::SeqCst);
        drop(self.sender);
        self.handle
            .join()
            .map_err(|_| anyhow!("Pipeline worker thread panicked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, StoreConfig};
    use crate::objects::FixedObjectBackend;
    use crate::text::{NoopTextBackend, TextRecognizer};
    use crate::visual::VisualAnalyzer;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn pipeline(dir: &Path) -> Pipeline {
        let mut config = PipelineConfig::default();
        config.store = StoreConfig {
            out_dir: dir.to_path_buf(),
        };
        config.compare.critical_elements.clear();
        let visual = VisualAnalyzer::new(config.visual.clone(), config.preprocess.clone());
        let text = TextRecognizer::with_backend(
            config.text.clone(),
            config.preprocess.clone(),
            Box::new(NoopTextBackend),
        );
        Pipeline::with_components(
            config,
            visual,
            text,
            Box::new(FixedObjectBackend {
                detections: Vec::new(),
            }),
        )
        .unwrap()
    }

    fn frame() -> Frame {
        Frame::new(RgbImage::from_pixel(160, 120, Rgb([128, 128, 128])))
    }

    #[test]
    fn test_jobs_processed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, results) = PipelineWorker::spawn(pipeline(dir.path()), Duration::from_millis(10));

        worker.submit(frame(), None).unwrap();
        worker.submit(frame(), None).unwrap();

        let first = results.recv_timeout(Duration::from_secs(10)).unwrap();
        let second = results.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(first.success);
        assert!(second.success);

        let pipeline = worker.stop().unwrap();
        assert_eq!(pipeline.stats().frames_processed, 2);
    }

    #[test]
    fn test_stop_without_jobs_joins_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, _results) =
            PipelineWorker::spawn(pipeline(dir.path()), Duration::from_millis(10));
        let pipeline = worker.stop().unwrap();
        assert_eq!(pipeline.stats().frames_processed, 0);
    }

    #[test]
    fn test_submit_after_stop_is_impossible_by_construction() {
        // stop() consumes the worker, so a stale submit cannot compile;
        // what we can check is that results drain before the join
        let dir = tempfile::tempdir().unwrap();
        let (worker, results) =
            PipelineWorker::spawn(pipeline(dir.path()), Duration::from_millis(10));
        worker.submit(frame(), None).unwrap();
        let analysis = results.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(analysis.success);
        worker.stop().unwrap();
    }
}
