// Export modules for use in tests
pub mod document;
pub mod error;
pub mod paged;
pub mod panic_handler;
pub mod recognize;
pub mod score;
pub mod settings;
pub mod snapshot;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use document::{Document, DocumentKind};
pub use error::ViewerError;
pub use viewer::{ViewerConfig, ViewerController};
