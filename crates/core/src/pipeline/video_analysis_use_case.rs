use std::path::Path;

use crate::classification::domain::result_table::ResultTable;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::error::AnalysisError;
use crate::video::domain::frame_source::{
    subsample_coefficient, FrameSource, StartUnit, VideoSourceOptions,
};
use crate::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;

use super::face_analyzer::FaceAnalyzer;

/// Frame selection for a run at roughly `target_fps` (every frame when
/// `None`), skipping the first `offset_ms` milliseconds. Negative offsets
/// count as zero.
pub fn sampling_options(
    native_fps: f64,
    target_fps: Option<f64>,
    offset_ms: i64,
) -> Result<VideoSourceOptions, AnalysisError> {
    let subsample = match target_fps {
        Some(fps) => subsample_coefficient(native_fps, fps)?,
        None => 1,
    };
    Ok(VideoSourceOptions {
        subsample,
        start: offset_ms.max(0) as u64,
        start_unit: StartUnit::Milliseconds,
        keyframes_only: false,
    })
}

/// Analyzes every frame of a video, or a time-subsampled selection.
pub struct VideoAnalysisUseCase {
    analyzer: FaceAnalyzer,
    detector: Box<dyn FaceDetector>,
    fps: Option<f64>,
    offset_ms: i64,
}

impl VideoAnalysisUseCase {
    pub fn new(analyzer: FaceAnalyzer, detector: Box<dyn FaceDetector>) -> Self {
        Self {
            analyzer,
            detector,
            fps: None,
            offset_ms: 0,
        }
    }

    /// Analyze about `fps` frames per second instead of all of them.
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
        let options = sampling_options(source.metadata().fps, self.fps, self.offset_ms)?;
        log::info!(
            "Analyzing one frame in {} starting at {} ms",
            options.subsample,
            options.start
        );
        source.set_options(options);
        self.run(&mut source)
    }

    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
    ) -> Result<ResultTable, Box<dyn std::error::Error>> {
        self.analyzer
            .process_stream(source.frames(), self.detector.as_mut())
    }
}
