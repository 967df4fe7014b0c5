use std::path::PathBuf;

use crate::classification::domain::result_table::ResultTable;
use crate::detection::domain::face_detector::FaceDetector;
use crate::video::domain::frame_source::FrameSource;
use crate::video::infrastructure::image_frame_source::{collect_image_paths, ImageFrameSource};

use super::face_analyzer::FaceAnalyzer;

/// Analyzes still images. The `frame` column holds each image's path.
pub struct ImageAnalysisUseCase {
    analyzer: FaceAnalyzer,
    detector: Box<dyn FaceDetector>,
}

impl ImageAnalysisUseCase {
    pub fn new(analyzer: FaceAnalyzer, detector: Box<dyn FaceDetector>) -> Self {
        Self { analyzer, detector }
    }

    /// `inputs` may mix image files and directories; directories are
    /// expanded to the images they contain, in name order.
    pub fn execute(&mut self, inputs: &[PathBuf]) -> Result<ResultTable, Box<dyn std::error::Error>> {
        let paths = collect_image_paths(inputs)?;
        log::info!("Analyzing {} images", paths.len());
        self.run(&mut ImageFrameSource::new(paths))
    }

    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
    ) -> Result<ResultTable, Box<dyn std::error::Error>> {
        self.analyzer
            .process_stream(source.frames(), self.detector.as_mut())
    }
}
