pub const DETECTOR_MODEL_NAME: &str = "face_detector.onnx";
pub const CLASSIFIER_MODEL_NAME: &str = "face_attributes.onnx";

/// Faces sent to the classifier per call unless configured otherwise.
pub const DEFAULT_BATCH_LEN: usize = 32;

/// Side of the square face crop the bundled attribute classifier expects.
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

/// Box enlargement applied before cropping for the bundled classifier.
pub const CLASSIFIER_BBOX_SCALE: f64 = 1.1;

/// Max detection cycles a track can go unmatched before removal.
pub const TRACKER_MAX_LOST: usize = 5;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Minimum score for the ONNX detector to report a face.
pub const DEFAULT_DETECT_CONFIDENCE: f64 = 0.25;
