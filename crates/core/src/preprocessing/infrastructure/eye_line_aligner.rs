use crate::detection::domain::detection::Detection;
use crate::preprocessing::domain::face_aligner::FaceAligner;

/// Rolls that do not reach this many degrees are not worth resampling.
const DEFAULT_MIN_ROLL: f64 = 0.5;

/// Levels the line between the two eye centers.
pub struct EyeLineAligner {
    min_roll: f64,
}

impl EyeLineAligner {
    pub fn new(min_roll: f64) -> Self {
        Self {
            min_roll: min_roll.abs(),
        }
    }
}

impl Default for EyeLineAligner {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ROLL)
    }
}

impl FaceAligner for EyeLineAligner {
    fn roll_degrees(&self, detection: &Detection) -> Option<f64> {
        let roll = detection.eyes?.roll_degrees();
        (roll.abs() >= self.min_roll).then_some(roll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::EyePair;
    use crate::shared::bbox::BoundingBox;
    use approx::assert_relative_eq;

    fn det_with_eyes(left: (f64, f64), right: (f64, f64)) -> Detection {
        Detection::new(BoundingBox::new(0, 0, 100, 100)).with_eyes(EyePair { left, right })
    }

    #[test]
    fn test_no_eyes_no_roll() {
        let det = Detection::new(BoundingBox::new(0, 0, 10, 10));
        assert_eq!(EyeLineAligner::default().roll_degrees(&det), None);
    }

    #[test]
    fn test_tilted_eyes_report_roll() {
        let det = det_with_eyes((30.0, 40.0), (70.0, 80.0));
        let roll = EyeLineAligner::default().roll_degrees(&det).unwrap();
        assert_relative_eq!(roll, 45.0);
    }

    #[test]
    fn test_small_roll_is_ignored() {
        let det = det_with_eyes((30.0, 40.0), (70.0, 40.1));
        assert_eq!(EyeLineAligner::default().roll_degrees(&det), None);
        assert!(EyeLineAligner::new(0.0).roll_degrees(&det).is_some());
    }

    #[test]
    fn test_counter_clockwise_roll_is_negative() {
        let det = det_with_eyes((30.0, 50.0), (70.0, 30.0));
        assert!(EyeLineAligner::default().roll_degrees(&det).unwrap() < 0.0);
    }
}
