//! Flatten the visible spread into one image, for the `view` command and
//! for eyeballing layout in tests

use std::path::Path;

use image::{ImageBuffer, Rgb, RgbImage, imageops};
use log::debug;

use crate::paged::{PageBitmap, Surface};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

fn to_image(bitmap: &PageBitmap) -> Option<RgbImage> {
    ImageBuffer::from_raw(bitmap.width_px, bitmap.height_px, bitmap.pixels.clone())
}

/// Compose `surfaces` left to right with a `gap` pixel gutter.
///
/// Slots without a bitmap (blanks, failed or unfinished pages) are left
/// white and take the size of the widest rendered slot. Returns `None`
/// when nothing has been rendered yet.
#[must_use]
pub fn compose(surfaces: &[Surface], gap: u32) -> Option<RgbImage> {
    let images: Vec<Option<RgbImage>> = surfaces
        .iter()
        .map(|surface| surface.bitmap.as_deref().and_then(to_image))
        .collect();

    let slot_width = images.iter().flatten().map(RgbImage::width).max()?;
    let height = images.iter().flatten().map(RgbImage::height).max()?;

    let slots = images.len() as u32;
    let width = slot_width * slots + gap * slots.saturating_sub(1);
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

    let mut x = 0i64;
    for image in &images {
        if let Some(image) = image {
            imageops::replace(&mut canvas, image, x, 0);
        }
        x += i64::from(slot_width + gap);
    }
    Some(canvas)
}

pub fn save_png(image: &RgbImage, path: &Path) -> Result<(), image::ImageError> {
    debug!(
        "Writing {}x{} snapshot to {path:?}",
        image.width(),
        image.height()
    );
    image.save_with_format(path, image::ImageFormat::Png)
}
