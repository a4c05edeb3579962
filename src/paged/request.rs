//! Render request and response types

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::backend::BackendError;
use super::types::PageBitmap;

/// Unique identifier for render jobs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl JobId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Cooperative cancellation flag shared by every job of one render pass.
///
/// Backends poll it between expensive steps. Correctness never depends on
/// the flag landing in time: stale results are dropped by generation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Request sent to render workers
#[derive(Debug)]
pub enum RenderRequest {
    /// Rasterize one page for a pass
    Page {
        id: JobId,
        generation: u64,
        page: usize,
        scale: f32,
        cancel: CancelToken,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Errors from render workers
#[derive(Debug, thiserror::Error)]
pub enum WorkerFault {
    #[error("page backend: {0}")]
    Backend(#[from] BackendError),

    #[error("{detail}")]
    Generic { detail: String },
}

impl WorkerFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Response from render workers
#[derive(Debug)]
pub enum RenderResponse {
    /// A worker picked the job up
    Started { id: JobId },

    /// Finished offscreen bitmap
    Page {
        id: JobId,
        generation: u64,
        page: usize,
        bitmap: Arc<PageBitmap>,
    },

    /// The job observed its cancellation token and stopped
    Cancelled { id: JobId, generation: u64 },

    /// Error during rendering
    Error {
        id: JobId,
        generation: u64,
        error: WorkerFault,
    },
}

impl RenderResponse {
    #[must_use]
    pub fn id(&self) -> JobId {
        match self {
            Self::Started { id }
            | Self::Page { id, .. }
            | Self::Cancelled { id, .. }
            | Self::Error { id, .. } => *id,
        }
    }
}
