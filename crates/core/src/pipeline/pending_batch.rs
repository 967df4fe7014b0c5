use std::collections::VecDeque;

use crate::shared::frame::Frame;

/// Preprocessed faces waiting for the classifier, in discovery order.
#[derive(Default)]
pub struct PendingBatch {
    faces: VecDeque<Frame>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, face: Frame) {
        self.faces.push_back(face);
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Removes and returns the `count` oldest faces (fewer if not enough
    /// are pending).
    pub fn flush(&mut self, count: usize) -> Vec<Frame> {
        let n = count.min(self.faces.len());
        self.faces.drain(..n).collect()
    }
}
