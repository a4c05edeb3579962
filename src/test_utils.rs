pub mod test_helpers {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::{Duration, Instant};

    use crate::paged::{
        BackendError, CancelToken, PageBackend, PageBitmap, PageDocument, PageSize,
    };

    /// How long a gated render waits for its release before giving up
    const GATE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Distinct, stable color for a page so tests can tell bitmaps apart
    pub fn page_color(page: usize) -> [u8; 3] {
        let page = page as u8;
        [page.wrapping_mul(20), 255 - page, page.wrapping_mul(7)]
    }

    /// In-memory document whose pages are solid colors.
    ///
    /// Every page has the same size. Renders are counted so tests can tell
    /// cache hits from real work.
    #[derive(Clone)]
    pub struct SolidBackend {
        page_count: usize,
        page_size: PageSize,
        renders: Arc<AtomicUsize>,
    }

    impl SolidBackend {
        pub fn new(page_count: usize, page_size: PageSize) -> Self {
            Self {
                page_count,
                page_size,
                renders: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Letter-ish page, 12 of them
        pub fn twelve_pages() -> Self {
            Self::new(12, PageSize::new(600.0, 800.0))
        }

        pub fn render_count(&self) -> usize {
            self.renders.load(Ordering::SeqCst)
        }
    }

    impl PageBackend for SolidBackend {
        fn name(&self) -> &'static str {
            "solid"
        }

        fn open(&self, _path: &Path) -> Result<Box<dyn PageDocument>, BackendError> {
            Ok(Box::new(SolidDocument {
                backend: self.clone(),
            }))
        }
    }

    struct SolidDocument {
        backend: SolidBackend,
    }

    impl PageDocument for SolidDocument {
        fn page_count(&self) -> usize {
            self.backend.page_count
        }

        fn page_size(&self, page: usize) -> Result<PageSize, BackendError> {
            self.check_page(page)?;
            Ok(self.backend.page_size)
        }

        fn render(
            &self,
            page: usize,
            scale: f32,
            cancel: &CancelToken,
        ) -> Result<PageBitmap, BackendError> {
            self.check_page(page)?;
            if cancel.is_cancelled() {
                return Err(BackendError::Cancelled);
            }
            self.backend.renders.fetch_add(1, Ordering::SeqCst);
            let size = self.backend.page_size.scaled_px(scale);
            Ok(PageBitmap::filled(page, scale, size, page_color(page)))
        }
    }

    #[derive(Default)]
    struct GateState {
        released: HashSet<usize>,
        started: Vec<usize>,
    }

    /// Test-controlled release valve shared by a [`GatedBackend`] and the
    /// test driving it
    #[derive(Clone, Default)]
    pub struct Gate {
        inner: Arc<(Mutex<GateState>, Condvar)>,
    }

    impl Gate {
        pub fn new() -> Self {
            Self::default()
        }

        /// Let every current and future render of `page` finish
        pub fn release(&self, page: usize) {
            let (lock, cvar) = &*self.inner;
            lock.lock().unwrap().released.insert(page);
            cvar.notify_all();
        }

        /// Block until `count` renders have started
        pub fn wait_started(&self, count: usize, timeout: Duration) -> Vec<usize> {
            let (lock, cvar) = &*self.inner;
            let deadline = Instant::now() + timeout;
            let mut state = lock.lock().unwrap();
            while state.started.len() < count {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                state = cvar.wait_timeout(state, remaining).unwrap().0;
            }
            state.started.clone()
        }

        fn enter(&self, page: usize, cancel: &CancelToken, honor_cancel: bool) -> bool {
            let (lock, cvar) = &*self.inner;
            let deadline = Instant::now() + GATE_TIMEOUT;
            let mut state = lock.lock().unwrap();
            state.started.push(page);
            cvar.notify_all();
            while !state.released.contains(&page) {
                if honor_cancel && cancel.is_cancelled() {
                    return false;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return false;
                }
                // Short waits so a cancellation is noticed without a notify
                let step = remaining.min(Duration::from_millis(10));
                state = cvar.wait_timeout(state, step).unwrap().0;
            }
            true
        }
    }

    /// Like [`SolidBackend`], but each render blocks until the test releases
    /// its page through the [`Gate`].
    ///
    /// With `honor_cancel` off the render runs to completion even after its
    /// pass was superseded, which is how a slow rasterizer behaves.
    #[derive(Clone)]
    pub struct GatedBackend {
        solid: SolidBackend,
        gate: Gate,
        honor_cancel: bool,
    }

    impl GatedBackend {
        pub fn new(solid: SolidBackend, gate: Gate, honor_cancel: bool) -> Self {
            Self {
                solid,
                gate,
                honor_cancel,
            }
        }
    }

    impl PageBackend for GatedBackend {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn open(&self, _path: &Path) -> Result<Box<dyn PageDocument>, BackendError> {
            Ok(Box::new(GatedDocument {
                inner: SolidDocument {
                    backend: self.solid.clone(),
                },
                gate: self.gate.clone(),
                honor_cancel: self.honor_cancel,
            }))
        }
    }

    struct GatedDocument {
        inner: SolidDocument,
        gate: Gate,
        honor_cancel: bool,
    }

    impl PageDocument for GatedDocument {
        fn page_count(&self) -> usize {
            self.inner.page_count()
        }

        fn page_size(&self, page: usize) -> Result<PageSize, BackendError> {
            self.inner.page_size(page)
        }

        fn render(
            &self,
            page: usize,
            scale: f32,
            cancel: &CancelToken,
        ) -> Result<PageBitmap, BackendError> {
            if !self.gate.enter(page, cancel, self.honor_cancel) {
                return Err(if cancel.is_cancelled() {
                    BackendError::Cancelled
                } else {
                    BackendError::Engine(format!("page {page} was never released"))
                });
            }
            // The inner document would bail on a cancelled token; a slow
            // rasterizer that ignores cancellation still delivers pixels
            let never = CancelToken::new();
            self.inner.render(page, scale, &never)
        }
    }

    /// Backend whose documents refuse to open
    pub struct BrokenBackend;

    impl PageBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>, BackendError> {
            Err(BackendError::open(path, "corrupt header"))
        }
    }

    /// Minimal partwise score with the given `<duration>` bodies, one note
    /// each
    pub fn partwise_score(durations: &[&str]) -> String {
        let notes: String = durations
            .iter()
            .map(|d| {
                format!(
                    "<note><pitch><step>C</step><octave>4</octave></pitch>\
                     <duration>{d}</duration></note>"
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <score-partwise version=\"4.0\">\
             <work><work-title>Test</work-title></work>\
             <part-list><score-part id=\"P1\"><part-name>Piano</part-name></score-part></part-list>\
             <part id=\"P1\"><measure number=\"1\">{notes}</measure></part>\
             </score-partwise>"
        )
    }
}
