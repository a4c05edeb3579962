//! User-visible viewer errors. None of them is fatal: every one is
//! recovered from by loading another file or navigating again.

use crate::paged::BackendError;
use crate::score::ContainerError;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// File kind not recognized
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The backend could not open the document
    #[error("Could not load document: {0}")]
    LoadFailure(String),

    /// Markup rejected before rendering
    #[error("{0}")]
    ValidationFailure(String),

    /// A render attempt failed
    #[error("Render failed: {0}")]
    RenderFailure(String),
}

impl From<BackendError> for ViewerError {
    fn from(err: BackendError) -> Self {
        Self::LoadFailure(err.to_string())
    }
}

impl From<ContainerError> for ViewerError {
    fn from(err: ContainerError) -> Self {
        Self::LoadFailure(err.to_string())
    }
}

impl From<std::io::Error> for ViewerError {
    fn from(err: std::io::Error) -> Self {
        Self::LoadFailure(err.to_string())
    }
}
