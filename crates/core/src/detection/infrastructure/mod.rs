pub mod bytetrack_tracker;
pub mod onnx_face_detector;
pub mod precomputed_detector;
pub mod tracking_detector;
