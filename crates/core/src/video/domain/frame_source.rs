use crate::shared::error::AnalysisError;
use crate::shared::frame::Frame;
use crate::shared::frame_id::FrameId;

pub type FrameItem = Result<(FrameId, Frame), Box<dyn std::error::Error>>;

/// Lazy, ordered, finite sequence of decoded frames.
///
/// Each call to [`frames`](FrameSource::frames) starts from the beginning
/// of the source, so the same source can be iterated more than once (the
/// keyframe face extractor relies on this).
pub trait FrameSource {
    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameItem> + '_>;
}

/// How [`VideoSourceOptions::start`] is measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StartUnit {
    #[default]
    Milliseconds,
    Frames,
}

/// Which frames of a video are yielded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSourceOptions {
    /// Keep one frame out of `subsample`, counted from the first kept frame.
    pub subsample: usize,
    pub start: u64,
    pub start_unit: StartUnit,
    /// Only decode keyframes. `subsample` is ignored in this mode.
    pub keyframes_only: bool,
}

impl Default for VideoSourceOptions {
    fn default() -> Self {
        Self {
            subsample: 1,
            start: 0,
            start_unit: StartUnit::Milliseconds,
            keyframes_only: false,
        }
    }
}

impl VideoSourceOptions {
    pub fn keyframes() -> Self {
        Self {
            keyframes_only: true,
            ..Self::default()
        }
    }

    /// Index of the first frame at or after `start`.
    pub fn first_frame(&self, fps: f64) -> usize {
        match self.start_unit {
            StartUnit::Frames => self.start as usize,
            StartUnit::Milliseconds if fps > 0.0 => {
                (self.start as f64 * fps / 1000.0).ceil() as usize
            }
            StartUnit::Milliseconds => 0,
        }
    }

    /// Whether the frame at decode position `index` is yielded.
    pub fn selects(&self, index: usize, first_frame: usize) -> bool {
        if index < first_frame {
            return false;
        }
        self.keyframes_only || (index - first_frame) % self.subsample.max(1) == 0
    }
}

/// Frame-skipping factor that brings `native_fps` down to about `target_fps`.
pub fn subsample_coefficient(native_fps: f64, target_fps: f64) -> Result<usize, AnalysisError> {
    if !(target_fps > 0.0) {
        return Err(AnalysisError::invalid_config(format!(
            "target fps must be positive, got {target_fps}"
        )));
    }
    Ok(((native_fps / target_fps).round() as usize).max(1))
}
