use thiserror::Error;

/// Failures raised by the analysis pipeline itself, as opposed to errors
/// bubbling up from decoders, detectors or classifiers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "precomputed detections do not match the stream: {supplied} entries supplied, \
         {consumed} frames processed"
    )]
    DetectionCountMismatch { supplied: usize, consumed: usize },

    #[error("classifier returned {got} rows for a batch of {expected} faces")]
    ClassifierRowMismatch { expected: usize, got: usize },

    #[error("frame {0} was not found in the stream")]
    FrameNotFound(String),
}

impl AnalysisError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        AnalysisError::InvalidConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_names_both_counts() {
        let e = AnalysisError::DetectionCountMismatch {
            supplied: 4,
            consumed: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("4 entries supplied"));
        assert!(msg.contains("3 frames processed"));
    }

    #[test]
    fn test_boxes_into_dyn_error() {
        let e: Box<dyn std::error::Error> = AnalysisError::invalid_config("batch_len must be > 0").into();
        assert_eq!(
            e.to_string(),
            "invalid configuration: batch_len must be > 0"
        );
    }
}
