use std::path::Path;

use crate::shared::frame::Frame;

/// Persists one image (e.g. an extracted face crop) to disk.
///
/// The output format is chosen from the path's extension.
pub trait ImageWriter {
    fn write(&self, path: &Path, image: &Frame) -> Result<(), Box<dyn std::error::Error>>;
}
