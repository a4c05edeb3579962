//! Single-document score rendering with supersession
//!
//! Each render is an attempt tagged with a monotonically increasing id. A
//! newer attempt (or a cancel) supersedes the previous one, and whatever
//! the superseded attempt eventually produces is dropped without touching
//! the visible status.

use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::backend::{NotationBackend, NotationError, NotationOutput};

/// Builds a fresh backend for every attempt
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn NotationBackend> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScoreStatus {
    Idle,
    Rendering,
    Rendered(NotationOutput),
    Failed(String),
}

struct AttemptResult {
    attempt: u64,
    result: Result<NotationOutput, NotationError>,
}

pub struct ScoreSession {
    factory: BackendFactory,
    attempt: u64,
    status: ScoreStatus,
    result_tx: Sender<AttemptResult>,
    result_rx: Receiver<AttemptResult>,
}

impl ScoreSession {
    #[must_use]
    pub fn new(factory: BackendFactory) -> Self {
        let (result_tx, result_rx) = flume::unbounded();
        Self {
            factory,
            attempt: 0,
            status: ScoreStatus::Idle,
            result_tx,
            result_rx,
        }
    }

    #[must_use]
    pub fn status(&self) -> &ScoreStatus {
        &self.status
    }

    #[must_use]
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.status == ScoreStatus::Rendering
    }

    /// Start rendering `markup` on a background thread, superseding any
    /// outstanding attempt. Returns the new attempt id.
    pub fn render(&mut self, markup: String) -> u64 {
        self.attempt += 1;
        self.status = ScoreStatus::Rendering;

        let attempt = self.attempt;
        let factory = Arc::clone(&self.factory);
        let tx = self.result_tx.clone();
        std::thread::spawn(move || {
            let mut backend = factory();
            let result = backend.load(&markup).and_then(|()| backend.render());
            let _ = tx.send(AttemptResult { attempt, result });
        });

        debug!("Score render attempt {attempt} started");
        attempt
    }

    /// Supersede the outstanding attempt and return to idle
    pub fn cancel(&mut self) {
        if self.status == ScoreStatus::Rendering {
            debug!("Score render attempt {} cancelled", self.attempt);
        }
        self.attempt += 1;
        self.status = ScoreStatus::Idle;
    }

    /// Apply finished attempts without blocking; true if the status changed
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(done) = self.result_rx.try_recv() {
            changed |= self.apply(done);
        }
        changed
    }

    /// Block until the current attempt settles or `timeout` elapses
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if !self.is_rendering() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.result_rx.recv_timeout(remaining) {
                Ok(done) => {
                    self.apply(done);
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return !self.is_rendering();
                }
            }
        }
    }

    fn apply(&mut self, done: AttemptResult) -> bool {
        if done.attempt != self.attempt {
            debug!("Dropping superseded score attempt {}", done.attempt);
            return false;
        }
        self.status = match done.result {
            Ok(output) => ScoreStatus::Rendered(output),
            Err(e) => {
                warn!("Score render failed: {e}");
                ScoreStatus::Failed(e.0)
            }
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::backend::{NotationBackend, OutlineBackend};

    const SCORE: &str = r#"<score-partwise><part-list><score-part id="P1"/></part-list>
<part id="P1"><measure><note/></measure></part></score-partwise>"#;

    fn session() -> ScoreSession {
        ScoreSession::new(Arc::new(|| {
            Box::new(OutlineBackend::new()) as Box<dyn NotationBackend>
        }))
    }

    #[test]
    fn renders_to_completion() {
        let mut session = session();
        session.render(SCORE.to_string());
        assert!(session.wait(Duration::from_secs(5)));
        assert!(matches!(session.status(), ScoreStatus::Rendered(_)));
    }

    #[test]
    fn backend_failure_is_reported() {
        let mut session = session();
        session.render("<score-partwise/>".to_string());
        assert!(session.wait(Duration::from_secs(5)));
        assert!(matches!(session.status(), ScoreStatus::Failed(msg) if msg.contains("no parts")));
    }

    #[test]
    fn superseded_attempt_is_dropped() {
        let mut session = session();
        let first = session.render("<score-partwise/>".to_string());
        let second = session.render(SCORE.to_string());
        assert!(second > first);

        assert!(session.wait(Duration::from_secs(5)));
        // Give the first attempt time to land, then make sure it changed nothing
        std::thread::sleep(Duration::from_millis(50));
        session.poll();
        assert!(matches!(session.status(), ScoreStatus::Rendered(_)));
    }

    #[test]
    fn cancel_returns_to_idle_and_ignores_late_result() {
        let mut session = session();
        session.render(SCORE.to_string());
        session.cancel();
        std::thread::sleep(Duration::from_millis(50));
        session.poll();
        assert_eq!(session.status(), &ScoreStatus::Idle);
    }
}
