use crate::shared::bbox::BoundingBox;

/// Eye centers in frame pixel coordinates, as seen on the image
/// (`left` is the eye with the smaller x).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyePair {
    pub left: (f64, f64),
    pub right: (f64, f64),
}

impl EyePair {
    /// Roll angle of the eye line in degrees; positive when the right eye
    /// sits lower than the left one.
    pub fn roll_degrees(&self) -> f64 {
        let dx = self.right.0 - self.left.0;
        let dy = self.right.1 - self.left.1;
        dy.atan2(dx).to_degrees()
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self {
            left: (self.left.0 + dx, self.left.1 + dy),
            right: (self.right.0 + dx, self.right.1 + dy),
        }
    }
}

/// One face found in a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub detect_conf: Option<f64>,
    pub eyes: Option<EyePair>,
    pub face_id: Option<u32>,
}

impl Detection {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            detect_conf: None,
            eyes: None,
            face_id: None,
        }
    }

    pub fn with_confidence(mut self, conf: f64) -> Self {
        self.detect_conf = Some(conf);
        self
    }

    pub fn with_eyes(mut self, eyes: EyePair) -> Self {
        self.eyes = Some(eyes);
        self
    }

    pub fn with_face_id(mut self, face_id: u32) -> Self {
        self.face_id = Some(face_id);
        self
    }

    /// Same detection with its box replaced (e.g. by the preprocessor's final box).
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }
}

/// Which [`Detection`] field a schema entry refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionField {
    BBox,
    DetectConf,
    Eyes,
    FaceId,
}

impl DetectionField {
    pub fn column_name(self) -> &'static str {
        match self {
            DetectionField::BBox => "bbox",
            DetectionField::DetectConf => "detect_conf",
            DetectionField::Eyes => "eyes",
            DetectionField::FaceId => "faceid",
        }
    }

    /// Auxiliary fields feed preprocessing and never reach the result table.
    pub fn is_auxiliary(self) -> bool {
        matches!(self, DetectionField::Eyes)
    }
}

/// Ordered list of fields a detector fills in.
///
/// The orchestrator reads it to name result columns, including when no
/// face was found and the table has to be built from the schema alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectionSchema {
    fields: Vec<DetectionField>,
}

impl DetectionSchema {
    pub fn new(fields: Vec<DetectionField>) -> Self {
        Self { fields }
    }

    /// Stateless detectors: box, confidence and eyes.
    pub fn plain() -> Self {
        Self::new(vec![
            DetectionField::BBox,
            DetectionField::DetectConf,
            DetectionField::Eyes,
        ])
    }

    /// Tracking detectors add a persistent face identifier.
    pub fn tracked() -> Self {
        Self::new(vec![
            DetectionField::BBox,
            DetectionField::DetectConf,
            DetectionField::Eyes,
            DetectionField::FaceId,
        ])
    }

    /// Replayed detections only carry a box.
    pub fn bbox_only() -> Self {
        Self::new(vec![DetectionField::BBox])
    }

    pub fn fields(&self) -> &[DetectionField] {
        &self.fields
    }

    /// Fields that become result columns, in schema order.
    pub fn output_fields(&self) -> impl Iterator<Item = DetectionField> + '_ {
        self.fields.iter().copied().filter(|f| !f.is_auxiliary())
    }

    pub fn output_column_names(&self) -> Vec<String> {
        self.output_fields()
            .map(|f| f.column_name().to_string())
            .collect()
    }
}
