use std::path::PathBuf;

use thiserror::Error;

use crate::image_stack::StackShape;

pub type Result<T> = std::result::Result<T, CellverseError>;

/// errors surfaced by the library.
/// the first four variants are caller mistakes (precondition violations) and are
/// always returned before any frame state is touched.
#[derive(Debug, Error)]
pub enum CellverseError {
    #[error("invalid frame index {index} (lineage has {len} frames)")]
    InvalidFrameIndex { index: usize, len: usize },

    #[error("invalid algorithm selector {0:?} (expected hill-climbing, simulated-annealing or gradient-descent)")]
    InvalidAlgorithm(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("image stack shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: StackShape, got: StackShape },

    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),

    #[error("unsupported image {}: {reason}", .path.display())]
    UnsupportedImage { path: PathBuf, reason: String },

    #[error("{}:{line}: {reason}", .path.display())]
    Csv { path: PathBuf, line: usize, reason: String },

    #[error("settings: {0}")]
    Settings(#[from] serde_json::Error),
}

impl CellverseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CellverseError::Io { path: path.into(), source }
    }

    /// true for caller mistakes, false for data/environment failures
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            CellverseError::InvalidFrameIndex { .. }
                | CellverseError::InvalidAlgorithm(_)
                | CellverseError::InvalidConfig(_)
                | CellverseError::ShapeMismatch { .. }
        )
    }
}
