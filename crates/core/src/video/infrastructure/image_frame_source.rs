use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::frame_id::FrameId;
use crate::video::domain::frame_source::{FrameItem, FrameSource};

/// Iterates a list of still images, one frame each, identified by path.
///
/// Decoding uses the `image` crate and happens lazily, one file at a time.
pub struct ImageFrameSource {
    paths: Vec<PathBuf>,
}

impl ImageFrameSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn single(path: &Path) -> Self {
        Self::new(vec![path.to_path_buf()])
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl FrameSource for ImageFrameSource {
    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameItem> + '_> {
        Box::new(self.paths.iter().enumerate().map(|(i, path)| -> FrameItem {
            let img = image::open(path)
                .map_err(|e| format!("failed to read image {}: {e}", path.display()))?
                .to_rgb8();
            let id = FrameId::Path(path.display().to_string());
            Ok((id, Frame::from_rgb_image(img, i)))
        }))
    }
}

/// Whether the path has one of the supported image extensions.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expands directories into their image files (sorted by name) and keeps
/// file arguments as given.
pub fn collect_image_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_path(p))
                .collect();
            found.sort();
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_yields_one_frame_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_test_image(dir.path(), "a.png", 40, 30);
        let b = write_test_image(dir.path(), "b.png", 20, 10);
        let mut source = ImageFrameSource::new(vec![a.clone(), b.clone()]);

        let items: Vec<_> = source.frames().map(|r| r.unwrap()).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, FrameId::Path(a.display().to_string()));
        assert_eq!(items[1].0, FrameId::Path(b.display().to_string()));
        assert_eq!((items[1].1.width(), items[1].1.height()), (20, 10));
    }

    #[test]
    fn test_frame_is_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), "a.png", 8, 8);
        let mut source = ImageFrameSource::single(&path);

        let (_, frame) = source.frames().next().unwrap().unwrap();
        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_missing_file_is_error() {
        let mut source = ImageFrameSource::single(Path::new("/nonexistent/test.png"));
        let err = source.frames().next().unwrap().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/test.png"));
    }

    #[test]
    fn test_source_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), "a.png", 8, 8);
        let mut source = ImageFrameSource::single(&path);

        assert_eq!(source.frames().count(), 1);
        assert_eq!(source.frames().count(), 1);
    }

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("photo.JPG")));
        assert!(is_image_path(Path::new("a/b.png")));
        assert!(!is_image_path(Path::new("clip.mp4")));
        assert!(!is_image_path(Path::new("noext")));
    }

    #[test]
    fn test_collect_image_paths_expands_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_test_image(dir.path(), "b.png", 4, 4);
        write_test_image(dir.path(), "a.jpg", 4, 4);
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let extra = PathBuf::from("/elsewhere/c.png");

        let paths = collect_image_paths(&[dir.path().to_path_buf(), extra.clone()]).unwrap();

        assert_eq!(
            paths,
            vec![dir.path().join("a.jpg"), dir.path().join("b.png"), extra]
        );
    }
}
