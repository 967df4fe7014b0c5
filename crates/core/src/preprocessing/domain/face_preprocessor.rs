use crate::detection::domain::detection::Detection;
use crate::preprocessing::domain::face_aligner::FaceAligner;
use crate::shared::bbox::BoundingBox;
use crate::shared::error::AnalysisError;
use crate::shared::frame::Frame;

/// Geometry applied to a detection before the face is cut out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreprocessOptions {
    /// Grow the box to a square around its center first.
    pub square: bool,
    /// Then scale width and height by this factor around the center.
    pub scale: f64,
    /// Output `(width, height)` of the face image.
    pub target: (u32, u32),
}

impl PreprocessOptions {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.scale > 0.0) {
            return Err(AnalysisError::invalid_config(format!(
                "bbox scale must be positive, got {}",
                self.scale
            )));
        }
        if self.target.0 == 0 || self.target.1 == 0 {
            return Err(AnalysisError::invalid_config(format!(
                "target shape must be non-zero, got {}x{}",
                self.target.0, self.target.1
            )));
        }
        Ok(())
    }

    /// The box actually cropped for `bbox`.
    pub fn final_bbox(&self, bbox: BoundingBox) -> BoundingBox {
        let bbox = if self.square { bbox.to_square() } else { bbox };
        bbox.scaled(self.scale)
    }
}

/// Turns one detection into a normalized face image.
pub trait FacePreprocessor {
    /// Returns the face image (exactly `options.target` in size) and the
    /// box it was cut from.
    fn preprocess(
        &self,
        frame: &Frame,
        detection: &Detection,
        options: &PreprocessOptions,
        aligner: Option<&dyn FaceAligner>,
    ) -> Result<(Frame, BoundingBox), Box<dyn std::error::Error>>;
}
