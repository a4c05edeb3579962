//! Document kind detection and the loaded-document handle

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ViewerError;
use crate::paged::{PageBackend, PageSize, RasterBackend};
use crate::score::MarkupDocument;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PagedFormat {
    Pdf,
    Raster,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreFormat {
    MusicXml,
    /// Zip-compressed MusicXML
    Mxl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    PagedImage(PagedFormat),
    NotatedScore(ScoreFormat),
    Unsupported,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::PagedImage(_) => "paged-image",
            DocumentKind::NotatedScore(_) => "notated-score",
            DocumentKind::Unsupported => "unsupported",
        }
    }
}

/// Extensions the `image` decoder is built for; bmp and tiff sit behind
/// their cargo features
fn is_raster_extension(ext: &str) -> bool {
    matches!(ext, "png" | "jpg" | "jpeg" | "gif" | "webp")
        || (cfg!(feature = "image-bmp") && ext == "bmp")
        || (cfg!(feature = "image-tiff") && matches!(ext, "tif" | "tiff"))
}

/// Classify a file by its leading bytes, falling back to its extension
pub fn detect_kind(path: &Path) -> std::io::Result<DocumentKind> {
    let mut head = [0u8; 16];
    let read = File::open(path)?.read(&mut head)?;
    Ok(classify(&head[..read], extension_of(path).as_deref()))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

#[must_use]
pub fn classify(head: &[u8], extension: Option<&str>) -> DocumentKind {
    if head.starts_with(b"%PDF") {
        return DocumentKind::PagedImage(PagedFormat::Pdf);
    }
    if is_raster_magic(head) {
        return DocumentKind::PagedImage(PagedFormat::Raster);
    }
    if head.starts_with(b"PK\x03\x04") {
        // Plenty of formats are zips; only trust one that says it is MXL
        return if extension == Some("mxl") {
            DocumentKind::NotatedScore(ScoreFormat::Mxl)
        } else {
            DocumentKind::Unsupported
        };
    }

    match extension {
        Some("pdf") => DocumentKind::PagedImage(PagedFormat::Pdf),
        Some(ext) if is_raster_extension(ext) => {
            DocumentKind::PagedImage(PagedFormat::Raster)
        }
        Some("musicxml" | "xml") => DocumentKind::NotatedScore(ScoreFormat::MusicXml),
        Some("mxl") => DocumentKind::NotatedScore(ScoreFormat::Mxl),
        _ if looks_like_markup(head) => DocumentKind::NotatedScore(ScoreFormat::MusicXml),
        _ => DocumentKind::Unsupported,
    }
}

fn is_raster_magic(head: &[u8]) -> bool {
    head.starts_with(b"\x89PNG\r\n\x1a\n")
        || head.starts_with(b"\xff\xd8\xff")
        || head.starts_with(b"GIF87a")
        || head.starts_with(b"GIF89a")
        || (head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP")
}

fn looks_like_markup(head: &[u8]) -> bool {
    let head = head.strip_prefix(b"\xef\xbb\xbf").unwrap_or(head);
    head.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'<')
}

/// Page backend able to open `format`
pub fn page_backend(format: PagedFormat) -> Result<Arc<dyn PageBackend>, ViewerError> {
    match format {
        PagedFormat::Raster => Ok(Arc::new(RasterBackend)),
        #[cfg(feature = "pdf")]
        PagedFormat::Pdf => Ok(Arc::new(crate::paged::PdfBackend)),
        #[cfg(not(feature = "pdf"))]
        PagedFormat::Pdf => Err(ViewerError::UnsupportedFormat(
            "PDF support was not compiled in (enable the `pdf` feature)".to_string(),
        )),
    }
}

/// A paged source whose first-page metrics have been captured
#[derive(Clone, Debug, PartialEq)]
pub struct PagedDocument {
    pub path: PathBuf,
    pub page_count: usize,
    /// Size of page 1; `None` only for an empty document
    pub page_size: Option<PageSize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreDocument {
    pub path: PathBuf,
    pub format: ScoreFormat,
    pub markup: MarkupDocument,
}

/// Currently loaded document; replaced wholesale on every load
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Document {
    #[default]
    Empty,
    Paged(PagedDocument),
    Score(ScoreDocument),
}

impl Document {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Document::Empty => None,
            Document::Paged(doc) => Some(&doc.path),
            Document::Score(doc) => Some(&doc.path),
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        match self {
            Document::Paged(doc) => doc.page_count,
            _ => 0,
        }
    }
}
