/// YOLO-style face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing.
/// The first two landmarks of each detection are the eye centers and are
/// reported as an [`EyePair`] for alignment.
use std::path::Path;

use crate::detection::domain::detection::{Detection, DetectionSchema, EyePair};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bbox::{bbox_iou, BoundingBox};
use crate::shared::frame::Frame;
use crate::shared::onnx_session;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 landmarks × (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

pub struct OnnxFaceDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
    schema: DetectionSchema,
}

impl OnnxFaceDetector {
    /// Load a face detection model and prepare for inference.
    ///
    /// The input resolution is read from the model's NCHW input shape and
    /// falls back to 640 if the shape is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = onnx_session::open_session(model_path)?;
        let input_size = onnx_session::static_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        log::info!("Face detector input size {input_size}, confidence >= {confidence}");

        Ok(Self {
            session,
            confidence,
            input_size,
            schema: DetectionSchema::plain(),
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face detector produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("unexpected detector output shape: {shape:?}").into());
        }
        let data = tensor.as_slice().ok_or("cannot get detector output slice")?;

        let rows = decode_rows(data, &shape);
        let mut raw: Vec<RawDetection> = rows
            .iter()
            .filter_map(|row| parse_row(row, self.confidence, scale, pad_x, pad_y))
            .collect();

        let kept = nms(&mut raw, NMS_IOU_THRESH);
        log::debug!("Frame {}: {} faces after NMS", frame.index(), kept.len());

        Ok(kept.into_iter().map(RawDetection::into_detection).collect())
    }

    fn schema(&self) -> &DetectionSchema {
        &self.schema
    }
}

/// Splits the output tensor into per-candidate rows.
///
/// Output is `[1, features, candidates]` (transposed) or
/// `[1, candidates, features]`; the smaller axis holds the features.
fn decode_rows(data: &[f32], shape: &[usize]) -> Vec<Vec<f32>> {
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };

    (0..num_dets)
        .map(|i| {
            if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            }
        })
        .collect()
}

/// Row layout: `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]` in
/// letterbox coordinates.
fn parse_row(row: &[f32], min_conf: f64, scale: f64, pad_x: u32, pad_y: u32) -> Option<RawDetection> {
    if row.len() < 5 {
        return None;
    }
    let conf = row[4] as f64;
    if conf < min_conf {
        return None;
    }

    let unletterbox = |x: f64, y: f64| ((x - pad_x as f64) / scale, (y - pad_y as f64) / scale);

    let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
    let (x1, y1) = unletterbox(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = unletterbox(cx + w / 2.0, cy + h / 2.0);

    let eyes = if row.len() >= 5 + NUM_KEYPOINT_VALUES {
        let keypoint = |k: usize| {
            let base = 5 + k * 3;
            if (row[base + 2] as f64) < KEYPOINT_CONF_THRESH {
                return None;
            }
            Some(unletterbox(row[base] as f64, row[base + 1] as f64))
        };
        match (keypoint(0), keypoint(1)) {
            (Some(a), Some(b)) => Some(if a.0 <= b.0 {
                EyePair { left: a, right: b }
            } else {
                EyePair { left: b, right: a }
            }),
            _ => None,
        }
    } else {
        None
    };

    Some(RawDetection {
        bbox: [x1, y1, x2, y2],
        confidence: conf,
        eyes,
    })
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // 114/255 gray padding
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

#[derive(Clone, Debug)]
struct RawDetection {
    bbox: [f64; 4],
    confidence: f64,
    eyes: Option<EyePair>,
}

impl RawDetection {
    fn into_detection(self) -> Detection {
        let det = Detection::new(BoundingBox::from_f64(self.bbox)).with_confidence(self.confidence);
        match self.eyes {
            Some(eyes) => det.with_eyes(eyes),
            None => det,
        }
    }
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i].bbox, &dets[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}
