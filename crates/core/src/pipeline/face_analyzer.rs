use std::time::Instant;

use crate::classification::domain::face_classifier::FaceClassifier;
use crate::classification::domain::result_table::{Column, ResultTable, Value};
use crate::detection::domain::detection::{Detection, DetectionField, DetectionSchema};
use crate::detection::domain::face_detector::FaceDetector;
use crate::preprocessing::domain::face_aligner::FaceAligner;
use crate::preprocessing::domain::face_preprocessor::{FacePreprocessor, PreprocessOptions};
use crate::shared::bbox::BoundingBox;
use crate::shared::error::AnalysisError;
use crate::shared::frame::Frame;
use crate::shared::frame_id::FrameId;
use crate::video::domain::frame_source::FrameItem;

use super::analyzer_config::AnalyzerConfig;
use super::pending_batch::PendingBatch;
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};

pub const FRAME_COLUMN: &str = "frame";

/// Drives detection, preprocessing and batched classification over a
/// stream of frames and assembles one result row per detected face.
///
/// The analyzer owns the classifier side of the pipeline. Frame sources
/// and detectors are supplied per run, so the same analyzer serves every
/// mode.
pub struct FaceAnalyzer {
    classifier: Box<dyn FaceClassifier>,
    preprocessor: Box<dyn FacePreprocessor>,
    aligner: Option<Box<dyn FaceAligner>>,
    config: AnalyzerConfig,
    logger: Box<dyn PipelineLogger>,
}

impl FaceAnalyzer {
    pub fn new(
        classifier: Box<dyn FaceClassifier>,
        preprocessor: Box<dyn FacePreprocessor>,
        config: AnalyzerConfig,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            classifier,
            preprocessor,
            aligner: None,
            config,
            logger: Box::new(NullPipelineLogger),
        })
    }

    pub fn with_aligner(mut self, aligner: Box<dyn FaceAligner>) -> Self {
        self.aligner = Some(aligner);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Runs the whole pipeline over `frames`.
    ///
    /// Rows come out in discovery order (frame order, then detector
    /// order within a frame) whatever the batch length. Faces are
    /// classified as soon as more than `batch_len` of them are pending;
    /// the remainder is classified once the stream ends. Any error aborts
    /// the run without a partial table.
    pub fn process_stream<I>(
        &mut self,
        frames: I,
        detector: &mut dyn FaceDetector,
    ) -> Result<ResultTable, Box<dyn std::error::Error>>
    where
        I: IntoIterator<Item = FrameItem>,
    {
        let options = self.config.preprocess_options();
        let batch_len = self.config.batch_len;
        let mut pending = PendingBatch::new();
        let mut found: Vec<(FrameId, Detection)> = Vec::new();
        let mut partials: Vec<ResultTable> = Vec::new();
        let mut frames_done = 0usize;

        for item in frames {
            let (frame_id, frame) = item?;

            let start = Instant::now();
            let detections = detector.detect(&frame)?;
            self.logger.timing("detect", elapsed_ms(start));
            self.logger.metric("faces_per_frame", detections.len() as f64);
            if self.config.verbose {
                log::info!("Frame {frame_id}: {} faces", detections.len());
            } else {
                log::debug!("Frame {frame_id}: {} faces", detections.len());
            }

            let start = Instant::now();
            for detection in detections {
                let (face, bbox) = self.preprocessor.preprocess(
                    &frame,
                    &detection,
                    &options,
                    self.aligner.as_deref(),
                )?;
                found.push((frame_id.clone(), detection.with_bbox(bbox)));
                pending.push(face);
            }
            self.logger.timing("preprocess", elapsed_ms(start));

            while pending.len() > batch_len {
                let batch = pending.flush(batch_len);
                partials.push(self.classify_batch(&batch)?);
            }

            frames_done += 1;
            self.logger.progress(frames_done, 0);
        }

        if !pending.is_empty() {
            let batch = pending.flush(pending.len());
            partials.push(self.classify_batch(&batch)?);
        }

        self.logger.info(&format!(
            "{} faces found in {frames_done} frames",
            found.len()
        ));
        self.logger.summary();

        self.assemble(detector.schema(), found, partials)
    }

    /// Crops one face the way the pipeline does, with caller-chosen
    /// geometry.
    pub fn preprocess(
        &self,
        frame: &Frame,
        detection: &Detection,
        options: &PreprocessOptions,
    ) -> Result<(Frame, BoundingBox), Box<dyn std::error::Error>> {
        self.preprocessor
            .preprocess(frame, detection, options, self.aligner.as_deref())
    }

    /// Per-face-id smoothing of a tracked result table.
    pub fn average_results(
        &self,
        table: ResultTable,
    ) -> Result<ResultTable, Box<dyn std::error::Error>> {
        self.classifier.average_results(table)
    }

    fn classify_batch(&mut self, faces: &[Frame]) -> Result<ResultTable, Box<dyn std::error::Error>> {
        let start = Instant::now();
        let table = self.classifier.classify(faces)?;
        self.logger.timing("classify", elapsed_ms(start));
        self.logger.metric("batch_size", faces.len() as f64);

        if table.num_rows() != faces.len() {
            return Err(AnalysisError::ClassifierRowMismatch {
                expected: faces.len(),
                got: table.num_rows(),
            }
            .into());
        }
        log::debug!("Classified a batch of {} faces", faces.len());
        Ok(table)
    }

    fn assemble(
        &self,
        schema: &DetectionSchema,
        found: Vec<(FrameId, Detection)>,
        partials: Vec<ResultTable>,
    ) -> Result<ResultTable, Box<dyn std::error::Error>> {
        if found.is_empty() {
            let names = std::iter::once(FRAME_COLUMN.to_string())
                .chain(schema.output_column_names())
                .chain(self.classifier.output_cols());
            return Ok(ResultTable::empty(names)?);
        }

        let mut columns = Vec::with_capacity(1 + schema.fields().len());
        columns.push(Column::new(
            FRAME_COLUMN,
            found.iter().map(|(id, _)| Value::from(id.clone())).collect(),
        ));
        for field in schema.output_fields() {
            columns.push(Column::new(
                field.column_name(),
                found.iter().map(|(_, d)| field_value(d, field)).collect(),
            ));
        }

        let detections = ResultTable::from_columns(columns)?;
        let classified = ResultTable::vstack(partials)?;
        Ok(detections.hstack(classified)?)
    }
}

fn field_value(detection: &Detection, field: DetectionField) -> Value {
    match field {
        DetectionField::BBox => Value::BBox(detection.bbox),
        DetectionField::DetectConf => Value::from(detection.detect_conf),
        DetectionField::FaceId => detection
            .face_id
            .map_or(Value::Null, |id| Value::Int(id as i64)),
        DetectionField::Eyes => Value::Null,
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
