pub mod crop_preprocessor;
pub mod eye_line_aligner;
