//! Single raster image treated as a one-page document

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use log::debug;

use super::backend::{BackendError, PageBackend, PageDocument, ensure_live};
use super::request::CancelToken;
use super::types::{PageBitmap, PageSize};

#[derive(Debug, Default)]
pub struct RasterBackend;

impl PageBackend for RasterBackend {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>, BackendError> {
        // Header-only probe; pixels are decoded lazily per render
        let dims = imagesize::size(path).map_err(|e| BackendError::open(path, e))?;
        let size = PageSize::new(dims.width as f32, dims.height as f32);
        debug!(
            "Opened raster page {path:?}: {}x{}",
            dims.width, dims.height
        );
        Ok(Box::new(RasterDocument {
            path: path.to_path_buf(),
            size,
        }))
    }
}

struct RasterDocument {
    path: PathBuf,
    size: PageSize,
}

impl PageDocument for RasterDocument {
    fn page_count(&self) -> usize {
        1
    }

    fn page_size(&self, page: usize) -> Result<PageSize, BackendError> {
        self.check_page(page)?;
        Ok(self.size)
    }

    fn render(
        &self,
        page: usize,
        scale: f32,
        cancel: &CancelToken,
    ) -> Result<PageBitmap, BackendError> {
        self.check_page(page)?;
        ensure_live(cancel)?;

        let decoded = image::open(&self.path)?.to_rgb8();
        ensure_live(cancel)?;

        let (width_px, height_px) = self.size.scaled_px(scale);
        let resized = if decoded.dimensions() == (width_px, height_px) {
            decoded
        } else {
            imageops::resize(&decoded, width_px, height_px, FilterType::Triangle)
        };
        ensure_live(cancel)?;

        Ok(PageBitmap {
            pixels: resized.into_raw(),
            width_px,
            height_px,
            page_num: page,
            scale,
        })
    }
}
