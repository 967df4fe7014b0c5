use std::path::Path;

use crate::classification::domain::result_table::ResultTable;
use crate::detection::infrastructure::precomputed_detector::PrecomputedDetector;
use crate::shared::bbox::BoundingBox;
use crate::video::domain::frame_source::{
    subsample_coefficient, FrameSource, StartUnit, VideoSourceOptions,
};
use crate::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;

use super::face_analyzer::FaceAnalyzer;

/// Classifies faces at caller-supplied positions instead of detecting
/// them: one list of boxes per analyzed frame, in frame order.
///
/// Build the analyzer with
/// [`AnalyzerConfig::for_precomputed`](super::analyzer_config::AnalyzerConfig::for_precomputed)
/// to crop the boxes exactly as given.
pub struct PrecomputedAnalysisUseCase {
    analyzer: FaceAnalyzer,
    fps: Option<f64>,
    start_frame: u64,
}

impl PrecomputedAnalysisUseCase {
    pub fn new(analyzer: FaceAnalyzer) -> Self {
        Self {
            analyzer,
            fps: None,
            start_frame: 0,
        }
    }

    pub fn with_fps(mut self, fps: Option<f64>) -> Self {
        self.fps = fps;
        self
    }

    /// First analyzed frame, counted in frames rather than milliseconds.
    pub fn with_start_frame(mut self, start_frame: u64) -> Self {
        self.start_frame = start_frame;
        self
    }

    pub fn execute(
        &mut self,
        video: &Path,
        boxes: Vec<Vec<BoundingBox>>,
    ) -> Result<ResultTable, Box<dyn std::error::Error>> {
        let mut source = FfmpegFrameSource::open(video, VideoSourceOptions::default())?;
        let subsample = match self.fps {
            Some(fps) => subsample_coefficient(source.metadata().fps, fps)?,
            None => 1,
        };
        source.set_options(VideoSourceOptions {
            subsample,
            start: self.start_frame,
            start_unit: StartUnit::Frames,
            keyframes_only: false,
        });
        self.run(&mut source, boxes)
    }

    /// Fails with `DetectionCountMismatch` when the number of box lists
    /// differs from the number of frames the source yielded.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        boxes: Vec<Vec<BoundingBox>>,
    ) -> Result<ResultTable, Box<dyn std::error::Error>> {
        let mut detector = PrecomputedDetector::new(boxes);
        let table = self.analyzer.process_stream(source.frames(), &mut detector)?;
        detector.ensure_consumed()?;
        Ok(table)
    }
}
