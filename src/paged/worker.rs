//! Render worker - runs in a dedicated thread

use std::path::Path;
use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::backend::{BackendError, PageBackend, PageDocument};
use super::cache::{CacheKey, PageCache};
use super::request::{CancelToken, JobId, RenderRequest, RenderResponse, WorkerFault};

/// Main worker function.
///
/// Opens its own document handle, then serves page requests until it sees
/// `Shutdown` or the request channel closes. If the document cannot be
/// opened every request is answered with the open error so the scheduler
/// never waits on a job nobody will run.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    backend: Arc<dyn PageBackend>,
    doc_path: &Path,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    cache: Arc<Mutex<PageCache>>,
) {
    let doc = backend.open(doc_path);
    if let Err(e) = &doc {
        warn!("Render worker could not open {doc_path:?}: {e}");
    }

    for request in requests {
        match request {
            RenderRequest::Page {
                id,
                generation,
                page,
                scale,
                cancel,
            } => {
                let job = PageJob {
                    id,
                    generation,
                    page,
                    scale,
                    cancel: &cancel,
                };
                match &doc {
                    Ok(doc) => job.run(doc.as_ref(), &cache, &responses),
                    Err(e) => {
                        let _ = responses.send(RenderResponse::Error {
                            id,
                            generation,
                            error: WorkerFault::generic(e.to_string()),
                        });
                    }
                }
            }

            RenderRequest::Shutdown => break,
        }
    }
}

struct PageJob<'a> {
    id: JobId,
    generation: u64,
    page: usize,
    scale: f32,
    cancel: &'a CancelToken,
}

impl PageJob<'_> {
    fn run(
        self,
        doc: &dyn PageDocument,
        cache: &Arc<Mutex<PageCache>>,
        responses: &Sender<RenderResponse>,
    ) {
        let Self {
            id,
            generation,
            page,
            scale,
            cancel,
        } = self;

        // Superseded before a worker got to it
        if cancel.is_cancelled() {
            let _ = responses.send(RenderResponse::Cancelled { id, generation });
            return;
        }
        let _ = responses.send(RenderResponse::Started { id });

        let key = CacheKey::new(page, scale);
        let cached = cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key);
        if let Some(bitmap) = cached {
            let _ = responses.send(RenderResponse::Page {
                id,
                generation,
                page,
                bitmap,
            });
            return;
        }

        match doc.render(page, scale, cancel) {
            Ok(bitmap) => {
                let bitmap = cache
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .insert(key, bitmap);
                let _ = responses.send(RenderResponse::Page {
                    id,
                    generation,
                    page,
                    bitmap,
                });
            }
            Err(BackendError::Cancelled) => {
                debug!("Job {id:?} for page {page} stopped on cancellation");
                let _ = responses.send(RenderResponse::Cancelled { id, generation });
            }
            Err(e) => {
                let _ = responses.send(RenderResponse::Error {
                    id,
                    generation,
                    error: WorkerFault::Backend(e),
                });
            }
        }
    }
}
