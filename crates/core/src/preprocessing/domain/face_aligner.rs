use crate::detection::domain::detection::Detection;

/// Decides how much a face must be rotated to be upright.
pub trait FaceAligner {
    /// Roll of the face in degrees (positive = clockwise on screen), or
    /// `None` when the detection carries nothing to align on.
    fn roll_degrees(&self, detection: &Detection) -> Option<f64>;
}
