use crate::classification::domain::face_classifier::FaceClassifier;
use crate::preprocessing::domain::face_preprocessor::PreprocessOptions;
use crate::shared::constants::DEFAULT_BATCH_LEN;
use crate::shared::error::AnalysisError;

/// Settings of one [`FaceAnalyzer`](super::face_analyzer::FaceAnalyzer).
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzerConfig {
    /// Faces per classifier call.
    pub batch_len: usize,
    pub bbox_to_square: bool,
    pub bbox_scale: f64,
    /// `(width, height)` of the faces handed to the classifier.
    pub target_shape: (u32, u32),
    /// Log every frame at info level instead of debug.
    pub verbose: bool,
}

impl AnalyzerConfig {
    /// Preprocessing geometry the classifier was trained with.
    pub fn for_classifier(classifier: &dyn FaceClassifier) -> Self {
        let (w, h, _) = classifier.input_shape();
        Self {
            batch_len: DEFAULT_BATCH_LEN,
            bbox_to_square: classifier.bbox_to_square(),
            bbox_scale: classifier.bbox_scale(),
            target_shape: (w, h),
            verbose: false,
        }
    }

    /// Caller-supplied boxes are cropped as given: no squaring, no scaling.
    pub fn for_precomputed(classifier: &dyn FaceClassifier) -> Self {
        Self {
            bbox_to_square: false,
            bbox_scale: 1.0,
            ..Self::for_classifier(classifier)
        }
    }

    pub fn with_batch_len(mut self, batch_len: usize) -> Self {
        self.batch_len = batch_len;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.batch_len == 0 {
            return Err(AnalysisError::invalid_config("batch_len must be > 0"));
        }
        self.preprocess_options().validate()
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            square: self.bbox_to_square,
            scale: self.bbox_scale,
            target: self.target_shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::result_table::ResultTable;
    use crate::shared::frame::Frame;
    use rstest::rstest;

    struct ShapeOnly;

    impl FaceClassifier for ShapeOnly {
        fn classify(&mut self, _faces: &[Frame]) -> Result<ResultTable, Box<dyn std::error::Error>> {
            Ok(ResultTable::new())
        }
        fn input_shape(&self) -> (u32, u32, u32) {
            (96, 112, 3)
        }
        fn output_cols(&self) -> Vec<String> {
            Vec::new()
        }
        fn bbox_to_square(&self) -> bool {
            true
        }
        fn bbox_scale(&self) -> f64 {
            1.2
        }
    }

    #[test]
    fn test_for_classifier_copies_geometry() {
        let config = AnalyzerConfig::for_classifier(&ShapeOnly);
        assert_eq!(config.target_shape, (96, 112));
        assert!(config.bbox_to_square);
        assert_eq!(config.bbox_scale, 1.2);
        assert_eq!(config.batch_len, DEFAULT_BATCH_LEN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_precomputed_disables_box_changes() {
        let config = AnalyzerConfig::for_precomputed(&ShapeOnly);
        assert!(!config.bbox_to_square);
        assert_eq!(config.bbox_scale, 1.0);
        assert_eq!(config.target_shape, (96, 112));
    }

    #[rstest]
    #[case::zero_batch(AnalyzerConfig { batch_len: 0, ..AnalyzerConfig::for_classifier(&ShapeOnly) })]
    #[case::zero_scale(AnalyzerConfig { bbox_scale: 0.0, ..AnalyzerConfig::for_classifier(&ShapeOnly) })]
    #[case::negative_scale(AnalyzerConfig { bbox_scale: -1.0, ..AnalyzerConfig::for_classifier(&ShapeOnly) })]
    #[case::zero_width(AnalyzerConfig { target_shape: (0, 10), ..AnalyzerConfig::for_classifier(&ShapeOnly) })]
    fn test_validate_rejects(#[case] config: AnalyzerConfig) {
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));
    }
}
