use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::detection::domain::detection::Detection;
use crate::preprocessing::domain::face_aligner::FaceAligner;
use crate::preprocessing::domain::face_preprocessor::{FacePreprocessor, PreprocessOptions};
use crate::shared::bbox::BoundingBox;
use crate::shared::frame::Frame;

/// Largest box side, in pixels, that is still cropped.
const MAX_CROP_SIDE: i64 = 1 << 15;

/// Cuts the face box out of the frame and resizes it to the target shape.
///
/// Parts of the box outside the frame are filled with black. When an
/// aligner reports a roll, the box is sampled along the rotated axes
/// (bilinear) so the eyes come out level.
pub struct CropPreprocessor {
    filter: FilterType,
}

impl CropPreprocessor {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl Default for CropPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FacePreprocessor for CropPreprocessor {
    fn preprocess(
        &self,
        frame: &Frame,
        detection: &Detection,
        options: &PreprocessOptions,
        aligner: Option<&dyn FaceAligner>,
    ) -> Result<(Frame, BoundingBox), Box<dyn std::error::Error>> {
        options.validate()?;
        if frame.channels() != 3 {
            return Err(format!("expected an RGB frame, got {} channels", frame.channels()).into());
        }

        let bbox = options.final_bbox(detection.bbox);
        if bbox.width() <= 0 || bbox.height() <= 0 {
            return Err(format!("degenerate face box {bbox}").into());
        }
        if bbox.width() > MAX_CROP_SIDE || bbox.height() > MAX_CROP_SIDE {
            return Err(format!("face box {bbox} is too large to crop").into());
        }

        let roll = aligner.and_then(|a| a.roll_degrees(detection));
        let face = match roll {
            Some(angle) if angle != 0.0 => rotated_crop(frame, bbox, angle, options.target),
            _ => {
                let crop = padded_crop(frame, bbox);
                let (w, h) = options.target;
                if crop.dimensions() == (w, h) {
                    crop
                } else {
                    imageops::resize(&crop, w, h, self.filter)
                }
            }
        };

        Ok((Frame::from_rgb_image(face, 0), bbox))
    }
}

/// Copies `bbox` out of the frame, black where it leaves the frame.
fn padded_crop(frame: &Frame, bbox: BoundingBox) -> RgbImage {
    let bw = bbox.width() as u32;
    let bh = bbox.height() as u32;
    let mut out = RgbImage::new(bw, bh);

    let fw = frame.width() as i32;
    let fh = frame.height() as i32;
    let x_start = bbox.x1.max(0);
    let x_end = bbox.x2.min(fw);
    let y_start = bbox.y1.max(0);
    let y_end = bbox.y2.min(fh);
    if x_start >= x_end || y_start >= y_end {
        return out;
    }

    let data = frame.data();
    let buf: &mut [u8] = &mut out;
    let row_len = (x_end - x_start) as usize * 3;
    for y in y_start..y_end {
        let src = (y as usize * fw as usize + x_start as usize) * 3;
        let dst_x = (x_start - bbox.x1) as usize;
        let dst_y = (y - bbox.y1) as usize;
        let dst = (dst_y * bw as usize + dst_x) * 3;
        buf[dst..dst + row_len].copy_from_slice(&data[src..src + row_len]);
    }
    out
}

/// Samples `bbox` rotated by `roll_degrees` around its center straight
/// into a `target`-sized image.
fn rotated_crop(frame: &Frame, bbox: BoundingBox, roll_degrees: f64, target: (u32, u32)) -> RgbImage {
    let (tw, th) = target;
    let (cx, cy) = bbox.center();
    let sx = bbox.width() as f64 / tw as f64;
    let sy = bbox.height() as f64 / th as f64;
    let (sin, cos) = roll_degrees.to_radians().sin_cos();

    RgbImage::from_fn(tw, th, |u, v| {
        // Offset from the box center in frame pixels, before rotation
        let px = (u as f64 + 0.5) * sx - bbox.width() as f64 / 2.0;
        let py = (v as f64 + 0.5) * sy - bbox.height() as f64 / 2.0;
        let x = cx + px * cos - py * sin;
        let y = cy + px * sin + py * cos;
        sample_bilinear(frame, x, y)
    })
}

/// Bilinear sample at pixel-center coordinates; outside is black.
fn sample_bilinear(frame: &Frame, x: f64, y: f64) -> Rgb<u8> {
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let ax = fx - x0;
    let ay = fy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0.0f64; 3];
    for (dx, dy, w) in [
        (0, 0, (1.0 - ax) * (1.0 - ay)),
        (1, 0, ax * (1.0 - ay)),
        (0, 1, (1.0 - ax) * ay),
        (1, 1, ax * ay),
    ] {
        if w == 0.0 {
            continue;
        }
        if let Some(px) = pixel_at(frame, x0 + dx, y0 + dy) {
            for c in 0..3 {
                acc[c] += px[c] as f64 * w;
            }
        }
    }
    Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

fn pixel_at(frame: &Frame, x: i64, y: i64) -> Option<[u8; 3]> {
    if x < 0 || y < 0 || x >= frame.width() as i64 || y >= frame.height() as i64 {
        return None;
    }
    let i = (y as usize * frame.width() as usize + x as usize) * 3;
    let d = frame.data();
    Some([d[i], d[i + 1], d[i + 2]])
}
