use std::fmt;

use serde::{Deserialize, Serialize};

/// Face bounding box in pixel coordinates, `(x1, y1)` inclusive top-left
/// and `(x2, y2)` exclusive bottom-right.
///
/// Coordinates may fall outside the frame: squarification and scaling
/// routinely push a box past the image border, and the preprocessor pads
/// rather than clamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Rounds float corners to the nearest pixel.
    pub fn from_f64(coords: [f64; 4]) -> Self {
        Self {
            x1: coords[0].round() as i32,
            y1: coords[1].round() as i32,
            x2: coords[2].round() as i32,
            y2: coords[3].round() as i32,
        }
    }

    pub fn to_f64(self) -> [f64; 4] {
        [
            self.x1 as f64,
            self.y1 as f64,
            self.x2 as f64,
            self.y2 as f64,
        ]
    }

    /// Widened to `i64` so boxes spanning the whole `i32` range cannot
    /// overflow.
    pub fn width(&self) -> i64 {
        self.x2 as i64 - self.x1 as i64
    }

    pub fn height(&self) -> i64 {
        self.y2 as i64 - self.y1 as i64
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x1 as f64 + self.x2 as f64) / 2.0,
            (self.y1 as f64 + self.y2 as f64) / 2.0,
        )
    }

    /// Smallest square with the same center that contains this box.
    pub fn to_square(self) -> Self {
        let side = self.width().max(self.height()) as f64;
        self.resized_around_center(side, side)
    }

    /// Scales width and height by `factor` around the box center.
    pub fn scaled(self, factor: f64) -> Self {
        if factor == 1.0 {
            return self;
        }
        self.resized_around_center(
            self.width() as f64 * factor,
            self.height() as f64 * factor,
        )
    }

    /// Saturates at the `i32` range.
    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x1: self.x1.saturating_add(dx),
            y1: self.y1.saturating_add(dy),
            x2: self.x2.saturating_add(dx),
            y2: self.y2.saturating_add(dy),
        }
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        bbox_iou(&self.to_f64(), &other.to_f64())
    }

    fn resized_around_center(self, w: f64, h: f64) -> Self {
        let (cx, cy) = self.center();
        let x1 = (cx - w / 2.0).round();
        let y1 = (cy - h / 2.0).round();
        // Float to int casts saturate.
        Self {
            x1: x1 as i32,
            y1: y1 as i32,
            x2: (x1 + w.round()) as i32,
            y2: (y1 + h.round()) as i32,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(c: [i32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

/// IoU between two boxes given as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_dimensions_and_center() {
        let b = BoundingBox::new(10, 20, 50, 100);
        assert_eq!(b.width(), 40);
        assert_eq!(b.height(), 80);
        assert_eq!(b.center(), (30.0, 60.0));
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let b = BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(b.width(), u32::MAX as i64);
        assert_eq!(b.height(), u32::MAX as i64);
        assert_eq!(b.center(), (-0.5, -0.5));

        let grown = b.to_square().scaled(2.0);
        assert_eq!(grown, BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX));
        assert_eq!(
            BoundingBox::new(0, 0, i32::MAX, 10).translated(5, 0).x2,
            i32::MAX
        );
    }

    // ── Squarification ───────────────────────────────────────────────

    #[test]
    fn test_to_square_tall_box_grows_horizontally() {
        let b = BoundingBox::new(10, 0, 30, 40).to_square();
        assert_eq!(b, BoundingBox::new(0, 0, 40, 40));
    }

    #[test]
    fn test_to_square_wide_box_grows_vertically() {
        let b = BoundingBox::new(0, 10, 60, 30).to_square();
        assert_eq!(b, BoundingBox::new(0, -10, 60, 50));
    }

    #[test]
    fn test_to_square_is_noop_on_square() {
        let b = BoundingBox::new(5, 5, 25, 25);
        assert_eq!(b.to_square(), b);
    }

    // ── Scaling ──────────────────────────────────────────────────────

    #[test]
    fn test_scaled_keeps_center() {
        let b = BoundingBox::new(100, 100, 200, 200).scaled(1.1);
        assert_eq!(b, BoundingBox::new(95, 95, 205, 205));
        assert_eq!(b.center(), (150.0, 150.0));
    }

    #[test]
    fn test_scaled_identity() {
        let b = BoundingBox::new(3, 7, 11, 13);
        assert_eq!(b.scaled(1.0), b);
    }

    #[test]
    fn test_translated() {
        let b = BoundingBox::new(0, 0, 10, 10).translated(5, -2);
        assert_eq!(b, BoundingBox::new(5, -2, 15, 8));
    }

    #[test]
    fn test_from_f64_rounds() {
        let b = BoundingBox::from_f64([0.4, 0.6, 10.5, 20.49]);
        assert_eq!(b, BoundingBox::new(0, 1, 11, 20));
    }

    #[test]
    fn test_display_matches_tuple_form() {
        assert_eq!(
            BoundingBox::new(81, 52, 320, 291).to_string(),
            "(81, 52, 320, 291)"
        );
    }

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical() {
        let a = BoundingBox::new(10, 10, 110, 110);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BoundingBox::new(0, 0, 100, 100);
        let b = BoundingBox::new(50, 0, 150, 100);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[rstest]
    #[case::disjoint([0.0, 0.0, 10.0, 10.0], [20.0, 20.0, 30.0, 30.0], 0.0)]
    #[case::touching([0.0, 0.0, 50.0, 50.0], [50.0, 0.0, 100.0, 50.0], 0.0)]
    #[case::contained([0.0, 0.0, 100.0, 100.0], [25.0, 25.0, 75.0, 75.0], 0.25)]
    #[case::quarter([0.0, 0.0, 10.0, 10.0], [5.0, 5.0, 15.0, 15.0], 25.0 / 175.0)]
    fn test_bbox_iou(#[case] a: [f64; 4], #[case] b: [f64; 4], #[case] expected: f64) {
        assert_relative_eq!(bbox_iou(&a, &b), expected);
    }
}
