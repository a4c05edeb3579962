//! MuPDF-backed page source

use std::path::Path;

use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::backend::{BackendError, PageBackend, PageDocument, ensure_live};
use super::request::CancelToken;
use super::types::{PageBitmap, PageSize};

impl From<mupdf::error::Error> for BackendError {
    fn from(err: mupdf::error::Error) -> Self {
        Self::Engine(err.to_string())
    }
}

#[derive(Debug, Default)]
pub struct PdfBackend;

impl PageBackend for PdfBackend {
    fn name(&self) -> &'static str {
        "mupdf"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>, BackendError> {
        let doc = Document::open(path.to_string_lossy().as_ref())
            .map_err(|e| BackendError::open(path, e))?;
        let page_count = doc.page_count().map_err(|e| BackendError::open(path, e))?;
        Ok(Box::new(PdfDocument {
            doc,
            page_count: page_count.max(0) as usize,
        }))
    }
}

struct PdfDocument {
    doc: Document,
    page_count: usize,
}

impl PageDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> Result<PageSize, BackendError> {
        self.check_page(page)?;
        let bounds = self.doc.load_page(page as i32 - 1)?.bounds()?;
        Ok(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
    }

    fn render(
        &self,
        page: usize,
        scale: f32,
        cancel: &CancelToken,
    ) -> Result<PageBitmap, BackendError> {
        self.check_page(page)?;
        ensure_live(cancel)?;

        let loaded = self.doc.load_page(page as i32 - 1)?;
        ensure_live(cancel)?;

        let transform = Matrix::new_scale(scale, scale);
        let pixmap = loaded.to_pixmap(&transform, &Colorspace::device_rgb(), false, false)?;
        ensure_live(cancel)?;

        let pixels = pixmap_to_rgb(&pixmap)?;
        Ok(PageBitmap {
            pixels,
            width_px: pixmap.width(),
            height_px: pixmap.height(),
            page_num: page,
            scale,
        })
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, BackendError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(BackendError::Engine(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(BackendError::Engine("Pixmap buffer size mismatch".into()));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(out)
}
