use std::collections::VecDeque;

use crate::detection::domain::detection::{Detection, DetectionSchema};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bbox::BoundingBox;
use crate::shared::error::AnalysisError;
use crate::shared::frame::Frame;

/// Replays caller-supplied bounding boxes, one list per frame, in the order
/// frames are visited.
///
/// The list is consumed in lockstep with the frame stream; call
/// [`ensure_consumed`](Self::ensure_consumed) afterwards to check both
/// sides had the same length.
pub struct PrecomputedDetector {
    remaining: VecDeque<Vec<BoundingBox>>,
    supplied: usize,
    frames_seen: usize,
    schema: DetectionSchema,
}

impl PrecomputedDetector {
    pub fn new(bboxes: Vec<Vec<BoundingBox>>) -> Self {
        Self {
            supplied: bboxes.len(),
            remaining: bboxes.into(),
            frames_seen: 0,
            schema: DetectionSchema::bbox_only(),
        }
    }

    /// Frames visited so far.
    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    /// Fails unless every supplied entry was used and no frame ran past the end.
    pub fn ensure_consumed(&self) -> Result<(), AnalysisError> {
        if self.remaining.is_empty() && self.frames_seen == self.supplied {
            Ok(())
        } else {
            Err(AnalysisError::DetectionCountMismatch {
                supplied: self.supplied,
                consumed: self.frames_seen,
            })
        }
    }
}

impl FaceDetector for PrecomputedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        self.frames_seen += 1;
        match self.remaining.pop_front() {
            Some(boxes) => Ok(boxes.into_iter().map(Detection::new).collect()),
            None => {
                log::warn!(
                    "No precomputed boxes left for frame {}; treating it as empty",
                    frame.index()
                );
                Ok(Vec::new())
            }
        }
    }

    fn schema(&self) -> &DetectionSchema {
        &self.schema
    }
}
