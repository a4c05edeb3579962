//! Paged rendering: spread layout, anchor normalization and the cancellable
//! render pipeline

mod backend;
mod cache;
pub mod geometry;
pub mod navigation;
#[cfg(feature = "pdf")]
mod pdf;
mod raster;
mod request;
mod scheduler;
pub mod spread;
mod state;
mod types;
mod worker;

pub use backend::{BackendError, PageBackend, PageDocument};
pub use cache::{CacheKey, PageCache};
pub use geometry::{GeometryDecision, GeometryModel, Viewport};
pub use navigation::Navigation;
#[cfg(feature = "pdf")]
pub use pdf::PdfBackend;
pub use raster::RasterBackend;
pub use request::{CancelToken, JobId, RenderRequest, RenderResponse, WorkerFault};
pub use scheduler::{JobState, RenderScheduler, Surface};
pub use spread::{SlotPosition, SpreadSlot};
pub use state::{Command, Effect, ViewState};
pub use types::*;

/// Worker threads per document; a spread never needs more than two
pub const DEFAULT_WORKERS: usize = 2;

/// Rendered bitmaps kept per document
pub const DEFAULT_CACHE_SIZE: usize = 8;
