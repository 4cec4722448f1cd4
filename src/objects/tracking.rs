//! Multi-frame object tracking by greedy centroid matching.
//!
//! Each existing track is matched, in ascending id order, to its nearest
//! unassigned detection within `max_distance`. This is greedy
//! nearest-neighbor assignment, not globally optimal matching; it is
//! adequate while frame-to-frame displacement stays small relative to
//! object separation. A bipartite minimum-cost matcher (Hungarian) can be
//! substituted behind the same interface if crossing trajectories matter.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ObjectConfig;
use crate::geometry::distance;
use crate::objects::backend::RawDetection;

/// Tracking record for one object identity.
///
/// Positions and confidences are append-only; ids are never reused. Tracks
/// are kept after disappearing so movement history stays queryable until the
/// caller resets the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectTrack {
    pub object_id: u64,
    pub class_name: String,
    /// Center positions, oldest first
    pub positions: Vec<(f32, f32)>,
    /// Detection confidences, oldest first
    pub confidences: Vec<f32>,
    pub first_seen: DateTime<Local>,
    pub last_seen: DateTime<Local>,
    /// Consecutive frames this track went unmatched
    pub missed_frames: u32,
    pub disappeared: bool,
}

impl ObjectTrack {
    fn last_position(&self) -> (f32, f32) {
        *self.positions.last().expect("track has at least one position")
    }
}

/// Greedy centroid tracker. One instance per frame stream; calls must be
/// serialized by the caller.
pub struct CentroidTracker {
    config: ObjectConfig,
    tracks: BTreeMap<u64, ObjectTrack>,
    next_id: u64,
}

impl CentroidTracker {
    pub fn new(config: ObjectConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Matches this frame's detections against existing tracks.
    ///
    /// Returns, per detection, the assigned track id (None when the
    /// detection was below the tracking-confidence floor).
    pub fn update(&mut self, detections: &[RawDetection]) -> Vec<Option<u64>> {
        if detections.is_empty() {
            self.age_all_tracks();
            return Vec::new();
        }

        let mut assignments: Vec<Option<u64>> = vec![None; detections.len()];
        let centers: Vec<(f32, f32)> = detections.iter().map(|d| d.bounds.center()).collect();

        let active_ids: Vec<u64> = self
            .tracks
            .values()
            .filter(|t| !t.disappeared)
            .map(|t| t.object_id)
            .collect();

        let mut detection_taken = vec![false; detections.len()];
        let mut matched_tracks: Vec<u64> = Vec::new();

        // Ascending id order = registration order
        for &track_id in &active_ids {
            let track_pos = self.tracks[&track_id].last_position();
            let mut best: Option<(usize, f32)> = None;
            for (i, center) in centers.iter().enumerate() {
                if detection_taken[i] {
                    continue;
                }
                let d = distance(track_pos, *center);
                if d <= self.config.max_distance && best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((i, d));
                }
            }

            if let Some((i, _)) = best {
                detection_taken[i] = true;
                matched_tracks.push(track_id);
                assignments[i] = Some(track_id);
                let track = self.tracks.get_mut(&track_id).unwrap();
                track.positions.push(centers[i]);
                track.confidences.push(detections[i].confidence);
                track.last_seen = Local::now();
                track.missed_frames = 0;
            }
        }

        // Unmatched active tracks age toward disappearance
        for &track_id in &active_ids {
            if !matched_tracks.contains(&track_id) {
                let track = self.tracks.get_mut(&track_id).unwrap();
                track.missed_frames += 1;
                if track.missed_frames > self.config.max_disappeared {
                    track.disappeared = true;
                    log::debug!("Track {} ({}) disappeared", track_id, track.class_name);
                }
            }
        }

        // Unmatched detections become new tracks; reappearing objects get a
        // fresh id, never a recycled one
        for (i, detection) in detections.iter().enumerate() {
            if !detection_taken[i] && detection.confidence >= self.config.min_tracking_confidence {
                assignments[i] = Some(self.register(detection, centers[i]));
            }
        }

        assignments
    }

    fn register(&mut self, detection: &RawDetection, center: (f32, f32)) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let now = Local::now();
        self.tracks.insert(
            id,
            ObjectTrack {
                object_id: id,
                class_name: detection.class_name.clone(),
                positions: vec![center],
                confidences: vec![detection.confidence],
                first_seen: now,
                last_seen: now,
                missed_frames: 0,
                disappeared: false,
            },
        );
        id
    }

    fn age_all_tracks(&mut self) {
        for track in self.tracks.values_mut() {
            if track.disappeared {
                continue;
            }
            track.missed_frames += 1;
            if track.missed_frames > self.config.max_disappeared {
                track.disappeared = true;
            }
        }
    }

    pub fn tracks(&self) -> impl Iterator<Item = &ObjectTrack> {
        self.tracks.values()
    }

    pub fn track(&self, object_id: u64) -> Option<&ObjectTrack> {
        self.tracks.get(&object_id)
    }

    /// Position history for one tracked object.
    pub fn movement_history(&self, object_id: u64) -> Option<&[(f32, f32)]> {
        self.tracks.get(&object_id).map(|t| t.positions.as_slice())
    }

    /// Clears all tracking state. The id counter keeps counting so ids stay
    /// unique across resets too.
    pub fn reset(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn detection(x: i32, y: i32, conf: f32) -> RawDetection {
        RawDetection {
            class_name: "asteroid".to_string(),
            confidence: conf,
            bounds: Rect::new(x, y, 20, 20),
        }
    }

    fn tracker() -> CentroidTracker {
        CentroidTracker::new(ObjectConfig::default())
    }

    #[test]
    fn test_identity_stable_under_small_motion() {
        let mut tracker = tracker();
        let first = tracker.update(&[detection(100, 100, 0.9)]);
        let id = first[0].unwrap();

        // Move by 10px per frame, well under max_distance
        for step in 1..=10 {
            let assignments = tracker.update(&[detection(100 + step * 10, 100, 0.9)]);
            assert_eq!(assignments[0], Some(id));
        }

        let track = tracker.track(id).unwrap();
        assert_eq!(track.positions.len(), 11);
        assert!(!track.disappeared);
    }

    #[test]
    fn test_distant_detection_gets_new_id() {
        let mut tracker = tracker();
        let first = tracker.update(&[detection(100, 100, 0.9)]);
        // 300px jump exceeds max_distance
        let second = tracker.update(&[detection(400, 100, 0.9)]);
        assert_ne!(first[0], second[0]);
    }

    #[test]
    fn test_disappearance_and_no_id_reuse() {
        let mut tracker = tracker();
        let id = tracker.update(&[detection(100, 100, 0.9)])[0].unwrap();

        // Absent for more than max_disappeared frames
        for _ in 0..=ObjectConfig::default().max_disappeared {
            tracker.update(&[]);
        }
        assert!(tracker.track(id).unwrap().disappeared);

        // Reappearance at the same spot gets a fresh id
        let new_id = tracker.update(&[detection(100, 100, 0.9)])[0].unwrap();
        assert_ne!(new_id, id);
        // The old track survives for history queries
        assert_eq!(tracker.movement_history(id).unwrap().len(), 1);
    }

    #[test]
    fn test_low_confidence_not_registered() {
        let mut tracker = tracker();
        let assignments = tracker.update(&[detection(50, 50, 0.2)]);
        assert_eq!(assignments[0], None);
        assert_eq!(tracker.tracks().count(), 0);
    }

    #[test]
    fn test_two_objects_keep_separate_ids() {
        let mut tracker = tracker();
        let first = tracker.update(&[detection(50, 50, 0.9), detection(300, 300, 0.9)]);
        let (a, b) = (first[0].unwrap(), first[1].unwrap());
        assert_ne!(a, b);

        let second = tracker.update(&[detection(55, 50, 0.9), detection(305, 300, 0.9)]);
        assert_eq!(second[0], Some(a));
        assert_eq!(second[1], Some(b));
    }

    #[test]
    fn test_missed_frame_then_recovery_within_window() {
        let mut tracker = tracker();
        let id = tracker.update(&[detection(100, 100, 0.9)])[0].unwrap();
        tracker.update(&[]);
        tracker.update(&[]);
        // Still within max_disappeared, same identity on return
        let assignments = tracker.update(&[detection(105, 100, 0.9)]);
        assert_eq!(assignments[0], Some(id));
        assert_eq!(tracker.track(id).unwrap().missed_frames, 0);
    }
}
