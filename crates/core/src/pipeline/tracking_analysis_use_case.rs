use std::path::Path;

use crate::classification::domain::result_table::ResultTable;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::tracking_detector::TrackingDetector;
use crate::shared::error::AnalysisError;
use crate::video::domain::frame_source::{FrameSource, VideoSourceOptions};
use crate::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;

use super::face_analyzer::FaceAnalyzer;
use super::video_analysis_use_case::sampling_options;

/// Video analysis with face tracking: full detection every
/// `detection_period` analyzed frames, a `faceid` column, and classifier
/// outputs averaged per face.
pub struct TrackingAnalysisUseCase {
    analyzer: FaceAnalyzer,
    detector: TrackingDetector,
    fps: Option<f64>,
    offset_ms: i64,
}

impl TrackingAnalysisUseCase {
    pub fn new(
        analyzer: FaceAnalyzer,
        detector: Box<dyn FaceDetector>,
        detection_period: usize,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            analyzer,
            detector: TrackingDetector::new(detector, detection_period)?,
            fps: None,
            offset_ms: 0,
        })
    }

    pub fn with_fps(mut self, fps: Option<f64>) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_offset_ms(mut self, offset_ms: i64) -> Self {
        self.offset_ms = offset_ms;
        self
    }

    pub fn execute(&mut self, video: &Path) -> Result<ResultTable, Box<dyn std::error::Error>> {
        let mut source = FfmpegFrameSource::open(video, VideoSourceOptions::default())?;
        source.set_options(sampling_options(
            source.metadata().fps,
            self.fps,
            self.offset_ms,
        )?);
        self.run(&mut source)
    }

    /// Tracks from scratch on every call.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
    ) -> Result<ResultTable, Box<dyn std::error::Error>> {
        self.detector.reset();
        let table = self
            .analyzer
            .process_stream(source.frames(), &mut self.detector)?;
        self.analyzer.average_results(table)
    }
}
