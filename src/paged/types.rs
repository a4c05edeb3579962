//! Core types for paged rendering

/// Page dimensions in abstract document units (points for PDF, pixels for
/// raster images)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel dimensions of the page rendered at `scale`, never below 1x1
    #[must_use]
    pub fn scaled_px(self, scale: f32) -> (u32, u32) {
        let width = (self.width * scale).round().max(1.0) as u32;
        let height = (self.height * scale).round().max(1.0) as u32;
        (width, height)
    }

    #[must_use]
    pub fn is_usable(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite()
    }
}

/// Rasterized page in RGB (3 bytes per pixel).
///
/// Workers always render into one of these offscreen buffers; surfaces only
/// ever receive a finished bitmap.
#[derive(Clone)]
pub struct PageBitmap {
    /// Raw RGB pixel data
    pub pixels: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    /// Page number (1-based)
    pub page_num: usize,
    /// Scale factor used for rendering
    pub scale: f32,
}

impl PageBitmap {
    /// Build a bitmap filled with a single color
    #[must_use]
    pub fn filled(page_num: usize, scale: f32, size: (u32, u32), rgb: [u8; 3]) -> Self {
        let (width_px, height_px) = size;
        let mut pixels = Vec::with_capacity(width_px as usize * height_px as usize * 3);
        for _ in 0..(width_px as usize * height_px as usize) {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            pixels,
            width_px,
            height_px,
            page_num,
            scale,
        }
    }

    /// Color of the pixel at (x, y), if inside the bitmap
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width_px || y >= self.height_px {
            return None;
        }
        let offset = (y as usize * self.width_px as usize + x as usize) * 3;
        self.pixels
            .get(offset..offset + 3)
            .map(|px| [px[0], px[1], px[2]])
    }
}

impl std::fmt::Debug for PageBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBitmap")
            .field("page_num", &self.page_num)
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}
