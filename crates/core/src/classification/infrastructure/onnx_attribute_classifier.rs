/// Sex and age classifier using ONNX Runtime via `ort`.
///
/// Expects square RGB faces and a model returning, per face, a sex
/// decision value and an age decision value: either as two outputs of
/// shape `[N, 1]` or one output of shape `[N, 2]`.
use std::path::Path;

use ndarray::Array4;

use crate::classification::domain::attributes::{self, ATTRIBUTE_COLUMNS};
use crate::classification::domain::face_classifier::FaceClassifier;
use crate::classification::domain::result_table::ResultTable;
use crate::shared::constants::{CLASSIFIER_BBOX_SCALE, CLASSIFIER_INPUT_SIZE};
use crate::shared::frame::Frame;
use crate::shared::onnx_session;

const NORM_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const NORM_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Tensor layout the model input uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    Nchw,
    Nhwc,
}

pub struct OnnxAttributeClassifier {
    session: ort::session::Session,
    input_size: u32,
    layout: Layout,
}

impl OnnxAttributeClassifier {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = onnx_session::open_session(model_path)?;
        let layout = detect_layout(&session);
        let input_size = match layout {
            Layout::Nchw => onnx_session::static_input_size(&session),
            Layout::Nhwc => None,
        }
        .unwrap_or(CLASSIFIER_INPUT_SIZE);
        log::info!("Attribute classifier input {input_size}x{input_size} ({layout:?})");

        Ok(Self {
            session,
            input_size,
            layout,
        })
    }
}

/// NHWC when the last input dimension is 3, NCHW otherwise.
fn detect_layout(session: &ort::session::Session) -> Layout {
    let last_is_channels = session.inputs().first().is_some_and(|input| {
        matches!(
            input.dtype(),
            ort::value::ValueType::Tensor { shape, .. } if shape.len() == 4 && shape[3] == 3
        )
    });
    if last_is_channels {
        Layout::Nhwc
    } else {
        Layout::Nchw
    }
}

impl FaceClassifier for OnnxAttributeClassifier {
    fn classify(&mut self, faces: &[Frame]) -> Result<ResultTable, Box<dyn std::error::Error>> {
        if faces.is_empty() {
            return Ok(ResultTable::empty(ATTRIBUTE_COLUMNS)?);
        }

        let tensor = to_tensor(faces, self.input_size, self.layout)?;
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        let (sex, age) = if outputs.len() >= 2 {
            let sex = outputs[0].try_extract_array::<f32>()?;
            let age = outputs[1].try_extract_array::<f32>()?;
            (
                sex.iter().map(|&v| v as f64).collect::<Vec<_>>(),
                age.iter().map(|&v| v as f64).collect::<Vec<_>>(),
            )
        } else if outputs.len() == 1 {
            let both = outputs[0].try_extract_array::<f32>()?;
            let flat: Vec<f64> = both.iter().map(|&v| v as f64).collect();
            split_pairs(&flat)?
        } else {
            return Err("attribute classifier produced no outputs".into());
        };

        if sex.len() != faces.len() || age.len() != faces.len() {
            return Err(format!(
                "attribute classifier returned {} / {} values for {} faces",
                sex.len(),
                age.len(),
                faces.len()
            )
            .into());
        }

        Ok(attributes::attribute_table(&sex, &age)?)
    }

    fn input_shape(&self) -> (u32, u32, u32) {
        (self.input_size, self.input_size, 3)
    }

    fn output_cols(&self) -> Vec<String> {
        ATTRIBUTE_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn bbox_to_square(&self) -> bool {
        true
    }

    fn bbox_scale(&self) -> f64 {
        CLASSIFIER_BBOX_SCALE
    }

    fn average_results(&self, table: ResultTable) -> Result<ResultTable, Box<dyn std::error::Error>> {
        Ok(attributes::average_attributes(table)?)
    }
}

/// Interleaved `[sex0, age0, sex1, age1, ...]` into two vectors.
fn split_pairs(flat: &[f64]) -> Result<(Vec<f64>, Vec<f64>), Box<dyn std::error::Error>> {
    if flat.len() % 2 != 0 {
        return Err(format!("expected pairs of outputs, got {} values", flat.len()).into());
    }
    Ok(flat.chunks_exact(2).map(|p| (p[0], p[1])).unzip())
}

/// Normalizes a batch of faces into a float tensor.
fn to_tensor(faces: &[Frame], size: u32, layout: Layout) -> Result<Array4<f32>, Box<dyn std::error::Error>> {
    let s = size as usize;
    let shape = match layout {
        Layout::Nchw => (faces.len(), 3, s, s),
        Layout::Nhwc => (faces.len(), s, s, 3),
    };
    let mut tensor = Array4::<f32>::zeros(shape);

    for (n, face) in faces.iter().enumerate() {
        if face.width() != size || face.height() != size || face.channels() != 3 {
            return Err(format!(
                "face {n} is {}x{}x{}, classifier expects {size}x{size}x3",
                face.width(),
                face.height(),
                face.channels()
            )
            .into());
        }
        let pixels = face.as_ndarray();
        for y in 0..s {
            for x in 0..s {
                for c in 0..3 {
                    let v = (pixels[[y, x, c]] as f32 / 255.0 - NORM_MEAN[c]) / NORM_STD[c];
                    match layout {
                        Layout::Nchw => tensor[[n, c, y, x]] = v,
                        Layout::Nhwc => tensor[[n, y, x, c]] = v,
                    }
                }
            }
        }
    }
    Ok(tensor)
}
