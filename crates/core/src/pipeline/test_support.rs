//! Deterministic collaborators shared by the pipeline tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::classification::domain::face_classifier::FaceClassifier;
use crate::classification::domain::result_table::{Column, ResultTable, Value};
use crate::detection::domain::detection::{Detection, DetectionSchema};
use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::analyzer_config::AnalyzerConfig;
use crate::pipeline::face_analyzer::FaceAnalyzer;
use crate::preprocessing::domain::face_aligner::FaceAligner;
use crate::preprocessing::domain::face_preprocessor::{FacePreprocessor, PreprocessOptions};
use crate::shared::bbox::BoundingBox;
use crate::shared::frame::Frame;
use crate::shared::frame_id::FrameId;
use crate::video::domain::frame_source::{FrameItem, FrameSource};

pub const FACE_FRAME: &str = "face_frame";
pub const FACE_TAG: &str = "face_tag";

/// Box of the `k`-th face in a frame: its `x1` doubles as a tag that
/// travels through preprocessing into the classifier output.
pub fn face_box(k: usize) -> BoundingBox {
    let x = (k * 10) as i32;
    BoundingBox::new(x, 0, x + 10, 10)
}

pub fn frame(index: usize) -> Frame {
    Frame::new(vec![0; 8 * 8 * 3], 8, 8, 3, index)
}

pub fn stream(n: usize) -> Vec<FrameItem> {
    (0..n).map(|i| Ok((FrameId::Index(i), frame(i)))).collect()
}

/// Emits `counts[frame index]` faces per frame.
pub struct StubDetector {
    counts: HashMap<usize, usize>,
    schema: DetectionSchema,
}

impl StubDetector {
    pub fn new(counts: &[usize]) -> Self {
        Self {
            counts: counts.iter().copied().enumerate().collect(),
            schema: DetectionSchema::plain(),
        }
    }
}

impl FaceDetector for StubDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let n = self.counts.get(&frame.index()).copied().unwrap_or(0);
        Ok((0..n)
            .map(|k| Detection::new(face_box(k)).with_confidence(0.9))
            .collect())
    }

    fn schema(&self) -> &DetectionSchema {
        &self.schema
    }
}

/// Face image filled with the box's `x1`, indexed like its source frame.
pub struct TaggingPreprocessor;

impl FacePreprocessor for TaggingPreprocessor {
    fn preprocess(
        &self,
        frame: &Frame,
        detection: &Detection,
        options: &PreprocessOptions,
        _aligner: Option<&dyn FaceAligner>,
    ) -> Result<(Frame, BoundingBox), Box<dyn std::error::Error>> {
        let (w, h) = options.target;
        let tag = detection.bbox.x1 as u8;
        let face = Frame::new(vec![tag; (w * h * 3) as usize], w, h, 3, frame.index());
        Ok((face, options.final_bbox(detection.bbox)))
    }
}

/// Echoes each face's frame index and tag; records batch sizes.
#[derive(Default)]
pub struct RecordingClassifier {
    pub calls: Arc<Mutex<Vec<usize>>>,
    /// Rows dropped from every answer, to break the one-row-per-face contract.
    pub drop_rows: usize,
}

impl FaceClassifier for RecordingClassifier {
    fn classify(&mut self, faces: &[Frame]) -> Result<ResultTable, Box<dyn std::error::Error>> {
        self.calls.lock().unwrap().push(faces.len());
        let kept = &faces[..faces.len().saturating_sub(self.drop_rows)];
        Ok(ResultTable::from_columns(vec![
            Column::new(
                FACE_FRAME,
                kept.iter().map(|f| Value::Int(f.index() as i64)).collect(),
            ),
            Column::new(
                FACE_TAG,
                kept.iter().map(|f| Value::Int(f.data()[0] as i64)).collect(),
            ),
        ])?)
    }

    fn input_shape(&self) -> (u32, u32, u32) {
        (4, 4, 3)
    }

    fn output_cols(&self) -> Vec<String> {
        vec![FACE_FRAME.to_string(), FACE_TAG.to_string()]
    }

    fn bbox_to_square(&self) -> bool {
        false
    }

    fn bbox_scale(&self) -> f64 {
        1.0
    }
}

pub fn analyzer(batch_len: usize) -> (FaceAnalyzer, Arc<Mutex<Vec<usize>>>) {
    let classifier = RecordingClassifier::default();
    let calls = classifier.calls.clone();
    let config = AnalyzerConfig::for_classifier(&classifier).with_batch_len(batch_len);
    let analyzer =
        FaceAnalyzer::new(Box::new(classifier), Box::new(TaggingPreprocessor), config).unwrap();
    (analyzer, calls)
}

/// Restartable in-memory frame source.
pub struct VecFrameSource {
    pub len: usize,
    pub restarts: usize,
}

impl VecFrameSource {
    pub fn new(len: usize) -> Self {
        Self { len, restarts: 0 }
    }
}

impl FrameSource for VecFrameSource {
    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameItem> + '_> {
        self.restarts += 1;
        Box::new(stream(self.len).into_iter())
    }
}
