use std::collections::HashMap;

use crate::detection::domain::detection::{Detection, DetectionSchema};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::bytetrack_tracker::ByteTracker;
use crate::shared::constants::TRACKER_MAX_LOST;
use crate::shared::error::AnalysisError;
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TrackingState {
    /// Next frame runs the wrapped detector.
    AwaitingDetection,
    /// Reusing the last detections; `elapsed` tracked frames since then.
    Tracking { elapsed: usize },
}

/// Decorator that runs the wrapped detector once every `detection_period`
/// frames and tracks faces in between.
///
/// Every detection cycle goes through a [`ByteTracker`] so each face keeps
/// the same `face_id` across frames. On tracked frames the last detections
/// are moved by the per-face velocity observed between the two most recent
/// detection cycles.
pub struct TrackingDetector {
    inner: Box<dyn FaceDetector>,
    tracker: ByteTracker,
    max_lost: usize,
    detection_period: usize,
    state: TrackingState,
    last_detections: Vec<Detection>,
    /// Per-face velocity (dx, dy per frame) between the last two cycles.
    velocity: HashMap<u32, (f64, f64)>,
    /// Per-face top-left corner at the last cycle.
    prev_pos: HashMap<u32, (i32, i32)>,
    schema: DetectionSchema,
}

impl TrackingDetector {
    pub fn new(inner: Box<dyn FaceDetector>, detection_period: usize) -> Result<Self, AnalysisError> {
        Self::with_max_lost(inner, detection_period, TRACKER_MAX_LOST)
    }

    /// `max_lost` is counted in detection cycles, not frames.
    pub fn with_max_lost(
        inner: Box<dyn FaceDetector>,
        detection_period: usize,
        max_lost: usize,
    ) -> Result<Self, AnalysisError> {
        if detection_period < 1 {
            return Err(AnalysisError::invalid_config(
                "detection_period must be >= 1",
            ));
        }
        Ok(Self {
            inner,
            tracker: ByteTracker::new(max_lost),
            max_lost,
            detection_period,
            state: TrackingState::AwaitingDetection,
            last_detections: Vec::new(),
            velocity: HashMap::new(),
            prev_pos: HashMap::new(),
            schema: DetectionSchema::tracked(),
        })
    }

    /// Forgets all tracks; the next frame runs a full detection and face
    /// ids restart from zero.
    pub fn reset(&mut self) {
        self.tracker = ByteTracker::new(self.max_lost);
        self.state = TrackingState::AwaitingDetection;
        self.last_detections.clear();
        self.velocity.clear();
        self.prev_pos.clear();
    }

    fn run_detection(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let detections = self.inner.detect(frame)?;
        let boxes: Vec<_> = detections.iter().map(|d| (d.bbox, d.detect_conf)).collect();
        let assignments = self.tracker.update(&boxes);

        log::debug!(
            "Frame {}: detection cycle, {} faces, {} live tracks",
            frame.index(),
            detections.len(),
            self.tracker.len()
        );

        let tracked: Vec<Detection> = assignments
            .iter()
            .map(|a| detections[a.det_index].clone().with_face_id(a.face_id))
            .collect();

        self.update_velocity(&tracked);
        self.last_detections = tracked;
        Ok(())
    }

    fn update_velocity(&mut self, detections: &[Detection]) {
        let mut new_pos = HashMap::new();
        for d in detections {
            let Some(id) = d.face_id else {
                continue;
            };
            new_pos.insert(id, (d.bbox.x1, d.bbox.y1));
            if let Some(&(old_x, old_y)) = self.prev_pos.get(&id) {
                let dx = (d.bbox.x1 - old_x) as f64 / self.detection_period as f64;
                let dy = (d.bbox.y1 - old_y) as f64 / self.detection_period as f64;
                self.velocity.insert(id, (dx, dy));
            }
        }
        self.velocity.retain(|id, _| new_pos.contains_key(id));
        self.prev_pos = new_pos;
    }

    fn extrapolate(&self, steps: usize) -> Vec<Detection> {
        self.last_detections
            .iter()
            .map(|d| {
                let vel = d.face_id.and_then(|id| self.velocity.get(&id));
                match vel {
                    None => d.clone(),
                    Some(&(vx, vy)) => {
                        let dx = (vx * steps as f64) as i32;
                        let dy = (vy * steps as f64) as i32;
                        let mut moved = d.clone().with_bbox(d.bbox.translated(dx, dy));
                        moved.eyes = d.eyes.map(|e| e.translated(dx as f64, dy as f64));
                        moved
                    }
                }
            })
            .collect()
    }
}

impl FaceDetector for TrackingDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        match self.state {
            TrackingState::AwaitingDetection => {
                self.run_detection(frame)?;
                if self.detection_period > 1 {
                    self.state = TrackingState::Tracking { elapsed: 0 };
                }
                Ok(self.last_detections.clone())
            }
            TrackingState::Tracking { elapsed } => {
                let elapsed = elapsed + 1;
                self.state = if elapsed + 1 >= self.detection_period {
                    TrackingState::AwaitingDetection
                } else {
                    TrackingState::Tracking { elapsed }
                };
                Ok(self.extrapolate(elapsed))
            }
        }
    }

    fn schema(&self) -> &DetectionSchema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::EyePair;
    use crate::shared::bbox::BoundingBox;
    use std::sync::{Arc, Mutex};

    struct FakeDetector {
        results: Vec<Vec<Detection>>,
        calls: Arc<Mutex<Vec<usize>>>,
        schema: DetectionSchema,
    }

    impl FakeDetector {
        fn new(results: Vec<Vec<Detection>>) -> Self {
            Self {
                results,
                calls: Arc::new(Mutex::new(Vec::new())),
                schema: DetectionSchema::plain(),
            }
        }
    }

    impl FaceDetector for FakeDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            let mut calls = self.calls.lock().unwrap();
            let result = self.results[calls.len() % self.results.len()].clone();
            calls.push(frame.index());
            Ok(result)
        }

        fn schema(&self) -> &DetectionSchema {
            &self.schema
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, index)
    }

    fn face(x: i32, y: i32) -> Detection {
        Detection::new(BoundingBox::new(x, y, x + 50, y + 50)).with_confidence(0.9)
    }

    #[test]
    fn test_period_zero_is_rejected() {
        let result = TrackingDetector::new(Box::new(FakeDetector::new(vec![vec![]])), 0);
        assert!(matches!(result, Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_schema_has_face_id() {
        let detector = TrackingDetector::new(Box::new(FakeDetector::new(vec![vec![]])), 2).unwrap();
        assert_eq!(detector.schema(), &DetectionSchema::tracked());
    }

    #[test]
    fn test_detects_every_period_frames() {
        let inner = FakeDetector::new(vec![vec![face(10, 10)]]);
        let calls = inner.calls.clone();
        let mut detector = TrackingDetector::new(Box::new(inner), 3).unwrap();

        for i in 0..7 {
            detector.detect(&frame(i)).unwrap();
        }

        assert_eq!(*calls.lock().unwrap(), vec![0, 3, 6]);
    }

    #[test]
    fn test_period_one_detects_every_frame() {
        let inner = FakeDetector::new(vec![vec![face(10, 10)]]);
        let calls = inner.calls.clone();
        let mut detector = TrackingDetector::new(Box::new(inner), 1).unwrap();

        for i in 0..3 {
            detector.detect(&frame(i)).unwrap();
        }

        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_face_id_stable_across_cycles() {
        let inner = FakeDetector::new(vec![vec![face(10, 10)], vec![face(14, 10)]]);
        let mut detector = TrackingDetector::new(Box::new(inner), 2).unwrap();

        let ids: Vec<Option<u32>> = (0..4)
            .map(|i| detector.detect(&frame(i)).unwrap()[0].face_id)
            .collect();

        assert!(ids.iter().all(|id| *id == Some(0)));
    }

    #[test]
    fn test_tracked_frames_are_extrapolated() {
        // x: 10 at frame 0, 20 at frame 2 → 5 px per frame
        let inner = FakeDetector::new(vec![vec![face(10, 10)], vec![face(20, 10)]]);
        let mut detector = TrackingDetector::new(Box::new(inner), 2).unwrap();

        let r1 = detector.detect(&frame(0)).unwrap();
        let r2 = detector.detect(&frame(1)).unwrap(); // no velocity yet
        detector.detect(&frame(2)).unwrap();
        let r3 = detector.detect(&frame(3)).unwrap();

        assert_eq!(r1[0].bbox.x1, 10);
        assert_eq!(r2[0].bbox.x1, 10);
        assert_eq!(r3[0].bbox, BoundingBox::new(25, 10, 75, 60));
    }

    #[test]
    fn test_eyes_move_with_box() {
        let eyes = EyePair {
            left: (20.0, 30.0),
            right: (40.0, 30.0),
        };
        let inner = FakeDetector::new(vec![
            vec![face(10, 10).with_eyes(eyes)],
            vec![face(20, 10).with_eyes(eyes.translated(10.0, 0.0))],
        ]);
        let mut detector = TrackingDetector::new(Box::new(inner), 2).unwrap();

        for i in 0..3 {
            detector.detect(&frame(i)).unwrap();
        }
        let r3 = detector.detect(&frame(3)).unwrap();

        assert_eq!(r3[0].eyes.unwrap().left, (35.0, 30.0));
    }

    #[test]
    fn test_no_faces_yields_nothing_on_tracked_frames() {
        let inner = FakeDetector::new(vec![vec![]]);
        let mut detector = TrackingDetector::new(Box::new(inner), 3).unwrap();

        for i in 0..4 {
            assert!(detector.detect(&frame(i)).unwrap().is_empty());
        }
    }

    #[test]
    fn test_new_face_appears_at_next_cycle() {
        let inner = FakeDetector::new(vec![
            vec![face(10, 10)],
            vec![face(10, 10), face(200, 200)],
        ]);
        let mut detector = TrackingDetector::new(Box::new(inner), 2).unwrap();

        assert_eq!(detector.detect(&frame(0)).unwrap().len(), 1);
        assert_eq!(detector.detect(&frame(1)).unwrap().len(), 1);
        let r2 = detector.detect(&frame(2)).unwrap();
        assert_eq!(r2.len(), 2);
        assert_eq!(r2[1].face_id, Some(1));
    }

    #[test]
    fn test_weak_detection_is_kept_with_face_id() {
        let weak = Detection::new(BoundingBox::new(10, 10, 60, 60)).with_confidence(0.3);
        let inner = FakeDetector::new(vec![vec![weak]]);
        let mut detector = TrackingDetector::new(Box::new(inner), 1).unwrap();

        let result = detector.detect(&frame(0)).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].face_id, Some(0));
        assert_eq!(result[0].detect_conf, Some(0.3));
    }

    #[test]
    fn test_reset_restarts_cycle_and_ids() {
        let inner = FakeDetector::new(vec![vec![face(10, 10)]]);
        let calls = inner.calls.clone();
        let mut detector = TrackingDetector::new(Box::new(inner), 3).unwrap();

        detector.detect(&frame(0)).unwrap();
        detector.detect(&frame(1)).unwrap();
        detector.reset();
        let after = detector.detect(&frame(0)).unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![0, 0]);
        assert_eq!(after[0].face_id, Some(0));
    }
}
