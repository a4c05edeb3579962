//! Viewer controller: owns the loaded document and routes every state
//! change through [`ViewState`] so derived layout stays consistent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::document::{
    self, Document, DocumentKind, PagedDocument, ScoreDocument, ScoreFormat,
};
use crate::error::ViewerError;
use crate::paged::{
    Command, Effect, GeometryDecision, GeometryModel, Navigation, PageBackend, RenderScheduler,
    SpreadSlot, Surface, ViewState, spread,
};
use crate::score::{
    self, BackendFactory, MarkupDocument, NotationBackend, OutlineBackend, ScoreSession,
    ScoreStatus,
};
use crate::settings::Settings;

/// Knobs the controller takes from settings
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub container_width: f32,
    pub geometry: GeometryModel,
    pub offset_mode: bool,
    pub render_workers: usize,
    pub page_cache_size: usize,
    pub duration_fallback: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for ViewerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            container_width: settings.container_width,
            geometry: GeometryModel::new(settings.gap, settings.min_two_up_scale),
            offset_mode: settings.offset_mode,
            render_workers: settings.render_workers,
            page_cache_size: settings.page_cache_size,
            duration_fallback: settings.duration_fallback,
        }
    }
}

pub struct ViewerController {
    config: ViewerConfig,
    state: ViewState,
    document: Document,
    scheduler: Option<RenderScheduler>,
    score: ScoreSession,
}

impl ViewerController {
    #[must_use]
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_notation_backend(
            config,
            Arc::new(|| Box::new(OutlineBackend::new()) as Box<dyn NotationBackend>),
        )
    }

    #[must_use]
    pub fn with_notation_backend(config: ViewerConfig, factory: BackendFactory) -> Self {
        let state = ViewState::new(config.container_width, config.geometry, config.offset_mode);
        Self {
            config,
            state,
            document: Document::Empty,
            scheduler: None,
            score: ScoreSession::new(factory),
        }
    }

    /// Classify `path` and run the matching pipeline.
    ///
    /// The previous document is always discarded first, so on any error the
    /// viewer is left empty (or, for rejected markup, holding the rejected
    /// [`MarkupDocument`] so its message can be shown).
    pub fn load_document(&mut self, path: &Path) -> Result<DocumentKind, ViewerError> {
        self.clear();

        let kind = document::detect_kind(path)?;
        info!("Loading {path:?} as {}", kind.as_str());
        match kind {
            DocumentKind::PagedImage(format) => {
                let backend = document::page_backend(format)?;
                self.load_paged_with(path, backend)?;
            }
            DocumentKind::NotatedScore(format) => {
                self.load_score(path, format)?;
            }
            DocumentKind::Unsupported => {
                return Err(ViewerError::UnsupportedFormat(path.display().to_string()));
            }
        }
        Ok(kind)
    }

    /// Load a paged document through an explicit backend
    pub fn load_paged_with(
        &mut self,
        path: &Path,
        backend: Arc<dyn PageBackend>,
    ) -> Result<(), ViewerError> {
        self.clear();

        // First-page metrics are captured once and never change for this
        // document
        let (page_count, page_size) = {
            let doc = backend.open(path)?;
            let page_count = doc.page_count();
            let page_size = if page_count > 0 {
                Some(doc.page_size(1)?)
            } else {
                None
            };
            (page_count, page_size)
        };
        info!("Opened {path:?}: {page_count} pages, first page {page_size:?}");

        self.scheduler = Some(RenderScheduler::with_config(
            backend,
            path.to_path_buf(),
            self.config.render_workers,
            self.config.page_cache_size,
        ));
        self.document = Document::Paged(PagedDocument {
            path: path.to_path_buf(),
            page_count,
            page_size,
        });
        self.apply(Command::SetDocument {
            page_count,
            page_size,
        });
        Ok(())
    }

    fn load_score(&mut self, path: &Path, format: ScoreFormat) -> Result<(), ViewerError> {
        let text = score::read_score_file(path, format == ScoreFormat::Mxl)?;
        self.load_markup(path.to_path_buf(), format, &text)
    }

    /// Ingest markup text and start rendering it when it validates
    pub fn load_markup(
        &mut self,
        path: PathBuf,
        format: ScoreFormat,
        text: &str,
    ) -> Result<(), ViewerError> {
        self.clear();

        let markup = score::ingest_with(text, self.config.duration_fallback);
        let rejection = markup.validation_error.clone();
        if rejection.is_none() {
            self.score.render(markup.raw_text.clone());
        }
        self.document = Document::Score(ScoreDocument {
            path,
            format,
            markup,
        });

        match rejection {
            Some(message) => Err(ViewerError::ValidationFailure(message)),
            None => Ok(()),
        }
    }

    /// Drop the current document and supersede all outstanding work
    pub fn clear(&mut self) {
        if self.document != Document::Empty {
            debug!("Clearing {:?}", self.document.path());
        }
        self.score.cancel();
        self.apply(Command::ClearDocument);
        self.scheduler = None;
        self.document = Document::Empty;
    }

    pub fn navigate(&mut self, nav: Navigation) {
        self.apply(Command::Navigate(nav));
    }

    pub fn set_offset_mode(&mut self, enabled: bool) {
        self.apply(Command::SetOffsetMode(enabled));
    }

    pub fn notify_viewport_resize(&mut self, width: f32) {
        self.apply(Command::SetContainerWidth(width));
    }

    fn apply(&mut self, cmd: Command) {
        let effects = self.state.apply(cmd);
        self.execute_effects(effects);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RenderPass => {
                    let slots = self.state.slots();
                    let decision = self.state.decision();
                    if let Some(scheduler) = self.scheduler.as_mut() {
                        scheduler.render_pass(&slots, decision.scale);
                    }
                }
                Effect::CancelRendering => {
                    if let Some(scheduler) = self.scheduler.as_mut() {
                        scheduler.cancel_all();
                    }
                }
            }
        }
    }

    /// Apply finished render results; true if anything visible changed
    pub fn poll(&mut self) -> bool {
        let pages = self
            .scheduler
            .as_mut()
            .map_or(0, RenderScheduler::poll);
        let score = self.score.poll();
        pages > 0 || score
    }

    /// Block until outstanding rendering settles or `timeout` elapses
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let settled = match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.wait_idle(timeout),
            None => self.score.wait(timeout),
        };
        if !settled {
            warn!("Rendering still outstanding after {timeout:?}");
        }
        settled
    }

    // Read-only projections

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn markup(&self) -> Option<&MarkupDocument> {
        match &self.document {
            Document::Score(doc) => Some(&doc.markup),
            _ => None,
        }
    }

    #[must_use]
    pub fn score_status(&self) -> &ScoreStatus {
        self.score.status()
    }

    #[must_use]
    pub fn current_slots(&self) -> Vec<SpreadSlot> {
        self.state.slots()
    }

    #[must_use]
    pub fn decision(&self) -> GeometryDecision {
        self.state.decision()
    }

    #[must_use]
    pub fn anchor(&self) -> usize {
        self.state.anchor
    }

    #[must_use]
    pub fn offset_mode(&self) -> bool {
        self.state.offset_mode
    }

    #[must_use]
    pub fn container_width(&self) -> f32 {
        self.state.viewport.container_width
    }

    #[must_use]
    pub fn gap(&self) -> f32 {
        self.state.geometry.gap
    }

    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.scheduler
            .as_ref()
            .is_some_and(RenderScheduler::is_rendering)
            || self.score.is_rendering()
    }

    #[must_use]
    pub fn surfaces(&self) -> &[Surface] {
        match &self.scheduler {
            Some(scheduler) => scheduler.surfaces(),
            None => &[],
        }
    }

    /// First render failure visible right now, if any
    #[must_use]
    pub fn render_error(&self) -> Option<ViewerError> {
        if let ScoreStatus::Failed(message) = self.score.status() {
            return Some(ViewerError::RenderFailure(message.clone()));
        }
        self.surfaces()
            .iter()
            .find_map(|surface| surface.error.clone())
            .map(ViewerError::RenderFailure)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.scheduler
            .as_ref()
            .map_or(0, RenderScheduler::generation)
    }

    #[must_use]
    pub fn page_range_label(&self) -> String {
        spread::page_range_label(&self.state.slots())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paged::PageSize;
    use crate::test_utils::test_helpers::{BrokenBackend, SolidBackend, partwise_score};

    const WAIT: Duration = Duration::from_secs(5);

    fn controller(width: f32) -> ViewerController {
        ViewerController::new(ViewerConfig {
            container_width: width,
            ..ViewerConfig::default()
        })
    }

    fn labels(viewer: &ViewerController) -> Vec<String> {
        viewer
            .current_slots()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn empty_viewer_shows_nothing() {
        let viewer = controller(1280.0);
        assert!(viewer.current_slots().is_empty());
        assert_eq!(viewer.page_range_label(), "");
        assert!(!viewer.is_rendering());
        assert_eq!(viewer.document(), &Document::Empty);
    }

    #[test]
    fn wide_viewport_shows_spreads() {
        let mut viewer = controller(1000.0);
        viewer
            .load_paged_with(Path::new("mem"), Arc::new(SolidBackend::twelve_pages()))
            .unwrap();

        assert!(viewer.decision().two_up);
        assert_eq!(labels(&viewer), ["left:1", "right:2"]);
        assert_eq!(viewer.page_range_label(), "Showing 1-2");
        assert!(viewer.wait_idle(WAIT));
        assert!(viewer.surfaces().iter().all(Surface::is_rendered));
    }

    #[test]
    fn narrow_resize_collapses_to_single() {
        let mut viewer = controller(1000.0);
        viewer
            .load_paged_with(Path::new("mem"), Arc::new(SolidBackend::twelve_pages()))
            .unwrap();
        viewer.navigate(Navigation::Page(4));
        assert_eq!(viewer.anchor(), 3);

        viewer.notify_viewport_resize(700.0);
        assert!(!viewer.decision().two_up);
        assert_eq!(labels(&viewer), ["single:3"]);
        assert!(viewer.wait_idle(WAIT));
        assert_eq!(viewer.surfaces()[0].page, Some(3));
    }

    #[test]
    fn offset_toggle_renormalizes() {
        let mut viewer = controller(1000.0);
        viewer
            .load_paged_with(Path::new("mem"), Arc::new(SolidBackend::twelve_pages()))
            .unwrap();
        viewer.set_offset_mode(true);
        assert!(viewer.offset_mode());
        assert_eq!(labels(&viewer), ["left:blank", "right:1"]);
        assert_eq!(viewer.page_range_label(), "Showing 1");

        viewer.navigate(Navigation::Next);
        assert_eq!(labels(&viewer), ["left:2", "right:3"]);
    }

    #[test]
    fn open_failure_leaves_viewer_empty() {
        let mut viewer = controller(1000.0);
        viewer
            .load_paged_with(Path::new("mem"), Arc::new(SolidBackend::twelve_pages()))
            .unwrap();

        let err = viewer
            .load_paged_with(Path::new("bad.pdf"), Arc::new(BrokenBackend))
            .unwrap_err();
        assert!(matches!(err, ViewerError::LoadFailure(msg) if msg.contains("corrupt header")));
        assert_eq!(viewer.document(), &Document::Empty);
        assert!(viewer.current_slots().is_empty());
    }

    #[test]
    fn zero_page_document_renders_nothing() {
        let mut viewer = controller(1000.0);
        viewer
            .load_paged_with(
                Path::new("mem"),
                Arc::new(SolidBackend::new(0, PageSize::new(600.0, 800.0))),
            )
            .unwrap();
        assert!(viewer.current_slots().is_empty());
        assert!(!viewer.is_rendering());
        assert_eq!(viewer.anchor(), 1);
    }

    #[test]
    fn valid_markup_is_rendered() {
        let mut viewer = controller(1280.0);
        viewer
            .load_markup(
                PathBuf::from("song.musicxml"),
                ScoreFormat::MusicXml,
                &partwise_score(&["4", "1.5"]),
            )
            .unwrap();

        let markup = viewer.markup().unwrap();
        assert_eq!(markup.fix_count, 1);
        assert!(viewer.wait_idle(WAIT));
        assert!(matches!(viewer.score_status(), ScoreStatus::Rendered(_)));
        assert!(viewer.render_error().is_none());
    }

    #[test]
    fn rejected_markup_is_kept_for_display() {
        let mut viewer = controller(1280.0);
        let err = viewer
            .load_markup(
                PathBuf::from("notes.xml"),
                ScoreFormat::MusicXml,
                "<html><body/></html>",
            )
            .unwrap_err();

        assert!(matches!(err, ViewerError::ValidationFailure(_)));
        assert!(!viewer.markup().unwrap().is_valid());
        assert_eq!(viewer.score_status(), &ScoreStatus::Idle);
    }
}
