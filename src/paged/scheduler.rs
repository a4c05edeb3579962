//! Render scheduler - owns the worker pool, the page cache and the
//! per-slot display surfaces of one paged document.
//!
//! Every call to [`RenderScheduler::render_pass`] opens a new generation.
//! Jobs capture the generation they were issued in, and a finished bitmap
//! is only blitted into a surface when its generation is still the current
//! one. Cancellation tokens ask workers to stop early, but the generation
//! check alone is what keeps stale pixels off screen.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::backend::PageBackend;
use super::cache::PageCache;
use super::request::{CancelToken, JobId, RenderRequest, RenderResponse};
use super::spread::{SlotPosition, SpreadSlot};
use super::types::PageBitmap;
use super::worker::render_worker;
use super::{DEFAULT_CACHE_SIZE, DEFAULT_WORKERS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

#[derive(Debug)]
struct JobRecord {
    generation: u64,
    slot: usize,
    page: usize,
    state: JobState,
}

/// Dedicated display surface for one slot of the current pass
#[derive(Clone, Debug)]
pub struct Surface {
    pub position: SlotPosition,
    /// `None` for an intentional blank
    pub page: Option<usize>,
    /// Last finished bitmap; never a partially drawn one
    pub bitmap: Option<Arc<PageBitmap>>,
    /// Inline message when this slot's job failed
    pub error: Option<String>,
    generation: u64,
}

impl Surface {
    fn for_slot(slot: &SpreadSlot, generation: u64) -> Self {
        Self {
            position: slot.position,
            page: slot.page,
            bitmap: None,
            error: None,
            generation,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_rendered(&self) -> bool {
        self.bitmap.is_some()
    }
}

/// Manages page rendering with worker threads and caching
pub struct RenderScheduler {
    doc_path: PathBuf,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    num_workers: usize,
    cache: Arc<Mutex<PageCache>>,
    generation: u64,
    pass_token: CancelToken,
    next_job_id: u64,
    jobs: HashMap<JobId, JobRecord>,
    surfaces: Vec<Surface>,
}

impl RenderScheduler {
    /// Create a scheduler with default configuration
    #[must_use]
    pub fn new(backend: Arc<dyn PageBackend>, doc_path: PathBuf) -> Self {
        Self::with_config(backend, doc_path, DEFAULT_WORKERS, DEFAULT_CACHE_SIZE)
    }

    #[must_use]
    pub fn with_config(
        backend: Arc<dyn PageBackend>,
        doc_path: PathBuf,
        num_workers: usize,
        cache_size: usize,
    ) -> Self {
        let cache = Arc::new(Mutex::new(PageCache::new(cache_size)));

        // flume gives us MPMC: every worker clones the request receiver and
        // pulls from the same queue
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let num_workers = num_workers.max(1);
        for _ in 0..num_workers {
            let backend = Arc::clone(&backend);
            let path = doc_path.clone();
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            let cache_clone = cache.clone();

            std::thread::spawn(move || {
                render_worker(backend, &path, rx, tx, cache_clone);
            });
        }

        debug!(
            "Render scheduler for {doc_path:?}: {num_workers} {} workers",
            backend.name()
        );

        Self {
            doc_path,
            request_tx,
            response_rx,
            num_workers,
            cache,
            generation: 0,
            pass_token: CancelToken::new(),
            next_job_id: 1,
            jobs: HashMap::new(),
            surfaces: Vec::new(),
        }
    }

    #[must_use]
    pub fn doc_path(&self) -> &Path {
        &self.doc_path
    }

    /// Current (latest issued) generation
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    #[must_use]
    pub fn job_state(&self, id: JobId) -> Option<JobState> {
        self.jobs.get(&id).map(|job| job.state)
    }

    /// Ids of the jobs issued by the current pass
    #[must_use]
    pub fn current_jobs(&self) -> Vec<JobId> {
        let mut ids: Vec<_> = self
            .jobs
            .iter()
            .filter(|(_, job)| job.generation == self.generation)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// True while any job of the current generation is outstanding
    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.jobs
            .values()
            .any(|job| job.generation == self.generation && !job.state.is_settled())
    }

    /// Start a new pass for `slots` at `scale`, superseding every outstanding
    /// job. Returns the new generation.
    pub fn render_pass(&mut self, slots: &[SpreadSlot], scale: f32) -> u64 {
        let generation = self.supersede();

        self.surfaces = slots
            .iter()
            .map(|slot| Surface::for_slot(slot, generation))
            .collect();

        if !(scale > 0.0) {
            debug!("Generation {generation}: nothing to render at scale {scale}");
            return generation;
        }

        for (slot_index, slot) in slots.iter().enumerate() {
            let Some(page) = slot.page else {
                continue;
            };
            let id = self.next_id();
            let request = RenderRequest::Page {
                id,
                generation,
                page,
                scale,
                cancel: self.pass_token.clone(),
            };
            if self.request_tx.send(request).is_err() {
                warn!("Render workers are gone; page {page} will not be drawn");
                continue;
            }
            self.jobs.insert(
                id,
                JobRecord {
                    generation,
                    slot: slot_index,
                    page,
                    state: JobState::Pending,
                },
            );
        }

        debug!(
            "Generation {generation}: {} jobs at scale {scale:.3}",
            self.current_jobs().len()
        );
        generation
    }

    /// Supersede outstanding work and blank the surfaces without starting a
    /// new pass
    pub fn cancel_all(&mut self) {
        self.supersede();
        self.surfaces.clear();
    }

    /// Drop the page cache (e.g. after the file changed on disk)
    pub fn invalidate_cache(&mut self) {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .invalidate_all();
    }

    fn supersede(&mut self) -> u64 {
        self.pass_token.cancel();
        self.pass_token = CancelToken::new();
        self.generation += 1;

        // Settled records of older passes are no longer interesting;
        // outstanding ones stay until their worker answers
        self.jobs.retain(|_, job| !job.state.is_settled());
        let mut superseded = 0;
        for job in self.jobs.values_mut() {
            job.state = JobState::Cancelled;
            superseded += 1;
        }
        if superseded > 0 {
            debug!(
                "Generation {}: cancelled {superseded} outstanding jobs",
                self.generation
            );
        }
        self.generation
    }

    /// Drain completed responses without blocking. Returns how many
    /// surfaces received a new bitmap.
    pub fn poll(&mut self) -> usize {
        let mut blitted = 0;
        while let Ok(response) = self.response_rx.try_recv() {
            if self.handle_response(response) {
                blitted += 1;
            }
        }
        blitted
    }

    /// Block until the current pass settles or `timeout` elapses. Returns
    /// true when nothing is outstanding anymore.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if !self.is_rendering() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    self.handle_response(response);
                }
                Err(RecvTimeoutError::Timeout) => return !self.is_rendering(),
                Err(RecvTimeoutError::Disconnected) => return !self.is_rendering(),
            }
        }
    }

    /// Response receiver, for callers that multiplex several channels
    #[must_use]
    pub fn response_receiver(&self) -> &Receiver<RenderResponse> {
        &self.response_rx
    }

    /// Apply one worker response; true if a surface was written
    pub fn handle_response(&mut self, response: RenderResponse) -> bool {
        let id = response.id();
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        let current = job.generation == self.generation;

        match response {
            RenderResponse::Started { .. } => {
                if job.state == JobState::Pending {
                    job.state = JobState::Running;
                }
                false
            }

            RenderResponse::Page {
                generation, bitmap, ..
            } => {
                if !current || generation != self.generation {
                    debug!(
                        "Dropping stale page {} from generation {generation}",
                        job.page
                    );
                    self.jobs.remove(&id);
                    return false;
                }
                job.state = JobState::Completed;
                let slot = job.slot;
                match self.surfaces.get_mut(slot) {
                    Some(surface) if surface.generation == generation => {
                        surface.bitmap = Some(bitmap);
                        surface.error = None;
                        true
                    }
                    _ => false,
                }
            }

            RenderResponse::Cancelled { .. } => {
                if current {
                    job.state = JobState::Cancelled;
                } else {
                    self.jobs.remove(&id);
                }
                false
            }

            RenderResponse::Error {
                generation, error, ..
            } => {
                if !current {
                    self.jobs.remove(&id);
                    return false;
                }
                warn!("Rendering page {} failed: {error}", job.page);
                job.state = JobState::Failed;
                let slot = job.slot;
                if let Some(surface) = self
                    .surfaces
                    .get_mut(slot)
                    .filter(|surface| surface.generation == generation)
                {
                    surface.error = Some(error.to_string());
                }
                false
            }
        }
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        self.pass_token.cancel();
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(RenderRequest::Shutdown);
        }
    }

    fn next_id(&mut self) -> JobId {
        let id = JobId::new(self.next_job_id);
        self.next_job_id += 1;
        id
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
