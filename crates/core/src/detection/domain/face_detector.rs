use crate::detection::domain::detection::{Detection, DetectionSchema};
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Implementations may be stateful (tracking, replaying a precomputed
/// list), hence `&mut self`. Detections are returned in a stable order
/// which the pipeline preserves all the way to the result table.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;

    /// Fields this detector fills in, in column order.
    fn schema(&self) -> &DetectionSchema;
}
