//! Page-image backend seam
//!
//! The scheduler never talks to a rasterizer directly. Each worker thread
//! opens its own [`PageDocument`] through a shared [`PageBackend`], since
//! native document handles (MuPDF in particular) are not `Send`.

use std::path::{Path, PathBuf};

use super::request::CancelToken;
use super::types::{PageBitmap, PageSize};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("cannot open {}: {detail}", path.display())]
    Open { path: PathBuf, detail: String },

    #[error("page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("render cancelled")]
    Cancelled,

    #[error("{0}")]
    Engine(String),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode: {0}")]
    Image(#[from] image::ImageError),
}

impl BackendError {
    pub fn open(path: &Path, detail: impl ToString) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        }
    }
}

/// An opened paginated source. Pages are 1-based.
pub trait PageDocument {
    fn page_count(&self) -> usize;

    /// Intrinsic size of `page` at scale 1.0
    fn page_size(&self, page: usize) -> Result<PageSize, BackendError>;

    /// Rasterize `page` at `scale` into a fresh offscreen bitmap.
    ///
    /// Implementations should check `cancel` between expensive steps and
    /// return [`BackendError::Cancelled`] once it is set.
    fn render(
        &self,
        page: usize,
        scale: f32,
        cancel: &CancelToken,
    ) -> Result<PageBitmap, BackendError>;

    /// Page dimensions at `scale`
    fn metrics(&self, page: usize, scale: f32) -> Result<PageSize, BackendError> {
        let size = self.page_size(page)?;
        Ok(PageSize::new(size.width * scale, size.height * scale))
    }

    fn check_page(&self, page: usize) -> Result<(), BackendError> {
        let page_count = self.page_count();
        if page == 0 || page > page_count {
            return Err(BackendError::PageOutOfRange { page, page_count });
        }
        Ok(())
    }
}

/// Opens paginated sources; shared by all render workers
pub trait PageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>, BackendError>;
}

/// Bail out of a render step once the pass has been superseded
pub(crate) fn ensure_live(cancel: &CancelToken) -> Result<(), BackendError> {
    if cancel.is_cancelled() {
        Err(BackendError::Cancelled)
    } else {
        Ok(())
    }
}
