use std::fmt;

/// Provenance of a frame: its position in a video, or the image file it came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameId {
    Index(usize),
    Path(String),
}

impl FrameId {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            FrameId::Index(i) => Some(*i),
            FrameId::Path(_) => None,
        }
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameId::Index(i) => write!(f, "{i}"),
            FrameId::Path(p) => f.write_str(p),
        }
    }
}

impl From<usize> for FrameId {
    fn from(index: usize) -> Self {
        FrameId::Index(index)
    }
}

impl From<&str> for FrameId {
    fn from(path: &str) -> Self {
        FrameId::Path(path.to_string())
    }
}
