use std::path::{Path, PathBuf};

use crate::classification::domain::result_table::{ResultTable, TableError};
use crate::detection::domain::detection::{Detection, DetectionField};
use crate::detection::domain::face_detector::FaceDetector;
use crate::preprocessing::domain::face_preprocessor::PreprocessOptions;
use crate::shared::error::AnalysisError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameSource, VideoSourceOptions};
use crate::video::domain::image_writer::ImageWriter;
use crate::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use crate::video::infrastructure::image_file_writer::ImageFileWriter;

use super::face_analyzer::{FaceAnalyzer, FRAME_COLUMN};

/// Geometry and file type of extracted faces. Unset fields fall back to
/// the analyzer's configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractOptions {
    pub target_shape: Option<(u32, u32)>,
    pub bbox_scale: Option<f64>,
    pub extension: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            target_shape: None,
            bbox_scale: None,
            extension: "png".to_string(),
        }
    }
}

/// Analyzes only the keyframes of a video, and can cut the faces it found
/// back out of the same keyframes.
pub struct KeyframeAnalysisUseCase {
    analyzer: FaceAnalyzer,
    detector: Box<dyn FaceDetector>,
    image_writer: Box<dyn ImageWriter>,
}

impl KeyframeAnalysisUseCase {
    pub fn new(analyzer: FaceAnalyzer, detector: Box<dyn FaceDetector>) -> Self {
        Self {
            analyzer,
            detector,
            image_writer: Box::new(ImageFileWriter::new()),
        }
    }

    pub fn with_image_writer(mut self, image_writer: Box<dyn ImageWriter>) -> Self {
        self.image_writer = image_writer;
        self
    }

    pub fn execute(&mut self, video: &Path) -> Result<ResultTable, Box<dyn std::error::Error>> {
        let mut source = FfmpegFrameSource::open(video, VideoSourceOptions::keyframes())?;
        self.run(&mut source)
    }

    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
    ) -> Result<ResultTable, Box<dyn std::error::Error>> {
        self.analyzer
            .process_stream(source.frames(), self.detector.as_mut())
    }

    /// Writes the face of every row of `table` to
    /// `output_dir/{row:08}.{extension}` and returns the written paths.
    pub fn extract_faces(
        &self,
        table: &ResultTable,
        video: &Path,
        output_dir: &Path,
        options: &ExtractOptions,
    ) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        let mut source = FfmpegFrameSource::open(video, VideoSourceOptions::keyframes())?;
        self.extract_faces_from(table, &mut source, output_dir, options)
    }

    /// Same as [`extract_faces`](Self::extract_faces) over any source
    /// yielding the frames the table was computed on.
    ///
    /// Rows must be in stream order. The `bbox` column already holds the
    /// squared and scaled box that was classified, and it goes through the
    /// analyzer's preprocessing again: squaring and `bbox_scale` (or the
    /// override) apply a second time, so with a scale above 1.0 the
    /// extracted face covers more context than the classified one. Eye
    /// positions are not stored in the table, so the aligner never rotates
    /// extracted faces.
    pub fn extract_faces_from(
        &self,
        table: &ResultTable,
        source: &mut dyn FrameSource,
        output_dir: &Path,
        options: &ExtractOptions,
    ) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        let bbox_name = DetectionField::BBox.column_name();
        let frame_col = table
            .column(FRAME_COLUMN)
            .ok_or_else(|| TableError::MissingColumn(FRAME_COLUMN.to_string()))?;
        let bbox_col = table
            .column(bbox_name)
            .ok_or_else(|| TableError::MissingColumn(bbox_name.to_string()))?;

        let config = self.analyzer.config();
        let geometry = PreprocessOptions {
            square: config.bbox_to_square,
            scale: options.bbox_scale.unwrap_or(config.bbox_scale),
            target: options.target_shape.unwrap_or(config.target_shape),
        };
        geometry.validate()?;

        let mut frames = source.frames();
        let mut current: Option<(usize, Frame)> = None;
        let mut written = Vec::with_capacity(table.num_rows());

        for row in 0..table.num_rows() {
            let wanted = frame_col.values[row]
                .as_i64()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| {
                    AnalysisError::invalid_config(format!("row {row} has no frame index"))
                })?;
            let bbox = bbox_col.values[row].as_bbox().ok_or_else(|| {
                AnalysisError::invalid_config(format!("row {row} has no bounding box"))
            })?;

            while current.as_ref().map(|(i, _)| *i) != Some(wanted) {
                let (id, frame) = frames
                    .next()
                    .ok_or_else(|| AnalysisError::FrameNotFound(wanted.to_string()))??;
                current = id.as_index().map(|i| (i, frame));
            }
            let Some((_, frame)) = current.as_ref() else {
                return Err(AnalysisError::FrameNotFound(wanted.to_string()).into());
            };

            let (face, _) = self
                .analyzer
                .preprocess(frame, &Detection::new(bbox), &geometry)?;
            let path = output_dir.join(format!("{row:08}.{}", options.extension));
            self.image_writer.write(&path, &face)?;
            written.push(path);
        }

        log::info!("Extracted {} faces to {}", written.len(), output_dir.display());
        Ok(written)
    }
}
