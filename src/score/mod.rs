//! Notated score handling: ingestion, `.mxl` unwrapping and rendering

mod backend;
pub mod container;
pub mod ingest;
mod session;

pub use backend::{NotationBackend, NotationError, NotationOutput, OutlineBackend};
pub use container::{ContainerError, read_score_file, unwrap_mxl};
pub use ingest::{MarkupDocument, ingest, ingest_with, sanitize, validate};
pub use session::{BackendFactory, ScoreSession, ScoreStatus};
