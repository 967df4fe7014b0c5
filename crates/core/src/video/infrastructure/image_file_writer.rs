use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Saves RGB frames with the `image` crate, creating parent directories.
#[derive(Default)]
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, image: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let img = image
            .to_rgb_image()
            .ok_or("image writer expects a 3-channel frame")?;
        img.save(path)
            .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }
}
