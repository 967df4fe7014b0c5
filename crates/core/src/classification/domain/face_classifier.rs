use crate::classification::domain::result_table::ResultTable;
use crate::shared::frame::Frame;

/// Classifies batches of normalized face images.
///
/// Besides classification the trait carries the preprocessing the model
/// was trained with, so the analyzer can prepare faces the same way.
pub trait FaceClassifier {
    /// Returns exactly one row per input face, in input order, with the
    /// columns named by [`output_cols`](Self::output_cols).
    fn classify(&mut self, faces: &[Frame]) -> Result<ResultTable, Box<dyn std::error::Error>>;

    /// `(width, height, channels)` of the expected face images.
    fn input_shape(&self) -> (u32, u32, u32);

    fn output_cols(&self) -> Vec<String>;

    /// Whether face boxes are squared before cropping.
    fn bbox_to_square(&self) -> bool;

    /// Factor applied to face boxes before cropping.
    fn bbox_scale(&self) -> f64;

    /// Aggregates per-frame results of tracked faces. Identity by default.
    fn average_results(&self, table: ResultTable) -> Result<ResultTable, Box<dyn std::error::Error>> {
        Ok(table)
    }
}
