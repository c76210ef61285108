//! The set of open sessions and the loop step that drives them.
//!
//! The registry owns the channel every session's run task reports on, so a
//! frontend only needs one extra branch in its event loop:
//!
//! ```no_run
//! # async fn demo() -> eview::EviewResult<()> {
//! use eview::{EngineConfig, ImageSlot, Registry};
//!
//! let mut registry = Registry::new(EngineConfig::default(), |_| ImageSlot::new())?;
//! registry.start(None);
//! loop {
//!     let touched = registry.turn().await;
//!     // redraw `touched` sessions, or select! against terminal input
//! #   drop(touched);
//! #   break;
//! }
//! registry.shutdown().await
//! # }
//! ```

use crate::config::EngineConfig;
use crate::error::{EviewResult, PathError};
use crate::model::{Completion, PathKind, Preset, SessionId};
use crate::session::{Session, SessionState};
use crate::surface::Display;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

enum Wake {
    Completed(Completion),
    Timer,
}

/// Open sessions in tab order, plus which one is active.
pub struct Registry<D: Display> {
    config: EngineConfig,
    sessions: Vec<Session<D>>,
    active: Option<SessionId>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl<D: Display> Registry<D> {
    /// One session per preset, in [`Preset::ALL`] order.
    pub fn new(config: EngineConfig, make_display: impl FnMut(Preset) -> D) -> EviewResult<Self> {
        Self::with_presets(config, &Preset::ALL, make_display)
    }

    pub fn with_presets(
        config: EngineConfig,
        presets: &[Preset],
        mut make_display: impl FnMut(Preset) -> D,
    ) -> EviewResult<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = Self {
            config,
            sessions: Vec::with_capacity(presets.len()),
            active: None,
            tx,
            rx,
        };
        for &preset in presets {
            registry.open(preset, make_display(preset))?;
        }
        registry.active = registry.sessions.first().map(Session::id);
        Ok(registry)
    }

    /// Add a session at the end of the tab order.
    pub fn open(&mut self, preset: Preset, display: D) -> EviewResult<SessionId> {
        let session = Session::new(preset, &self.config, display, self.tx.clone())?;
        let id = session.id();
        self.sessions.push(session);
        Ok(id)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session<D>> {
        self.sessions.iter()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(Session::id).collect()
    }

    pub fn get(&self, id: SessionId) -> Option<&Session<D>> {
        self.sessions.iter().find(|session| session.id() == id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session<D>> {
        self.sessions.iter_mut().find(|session| session.id() == id)
    }

    /// First session opened with `preset`.
    pub fn by_preset(&self, preset: Preset) -> Option<&Session<D>> {
        self.sessions.iter().find(|session| session.preset() == preset)
    }

    pub fn active(&self) -> Option<SessionId> {
        self.active
    }

    pub fn active_session(&self) -> Option<&Session<D>> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn active_session_mut(&mut self) -> Option<&mut Session<D>> {
        let id = self.active?;
        self.get_mut(id)
    }

    /// Make `id` the visible session. Returns `false` for unknown ids.
    pub fn activate(&mut self, id: SessionId) -> bool {
        let Some(session) = self.get_mut(id) else {
            return false;
        };
        session.on_shown();
        self.active = Some(id);
        true
    }

    /// Route the startup file, then show whichever session ended up active.
    pub fn start(&mut self, startup_file: Option<&Path>) -> Option<SessionId> {
        if let Some(path) = startup_file {
            match self.route_startup_file(path) {
                Ok(Some(id)) => info!(session = %id, path = %path.display(), "opened startup file"),
                Ok(None) => info!(path = %path.display(), "no preset claims startup file"),
                Err(err) => warn!(%err, "startup file could not be opened"),
            }
        }
        let id = self.active?;
        self.activate(id);
        Some(id)
    }

    /// Bind `path` as the script of the preset claiming its extension, and
    /// activate that session.
    ///
    /// `Ok(None)` when no preset claims the file. On `Err` the session is
    /// still activated, showing the failure as its notice.
    pub fn route_startup_file(&mut self, path: &Path) -> Result<Option<SessionId>, PathError> {
        let Some(preset) = Preset::for_path(path) else {
            return Ok(None);
        };
        let Some(id) = self.by_preset(preset).map(Session::id) else {
            debug!(%preset, "no open session for preset");
            return Ok(None);
        };
        let routed = match self.get_mut(id) {
            Some(session) => session.on_path_changed(PathKind::Script, path),
            None => Ok(()),
        };
        self.activate(id);
        routed.map(|()| Some(id))
    }

    /// Earliest armed countdown across all sessions.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.sessions.iter().filter_map(Session::deadline).min()
    }

    /// No session has pending or running work.
    pub fn is_quiescent(&self) -> bool {
        self.sessions
            .iter()
            .all(|session| session.state() == SessionState::Idle)
    }

    /// Fire every countdown that has expired by `now`.
    pub fn fire_due(&mut self, now: Instant) -> Vec<SessionId> {
        self.sessions
            .iter_mut()
            .filter_map(|session| session.poll_timer(now).then(|| session.id()))
            .collect()
    }

    /// Hand a run report to its session. Reports for closed sessions are dropped.
    pub fn deliver(&mut self, completion: Completion) -> Option<SessionId> {
        let id = completion.session_id;
        match self.get_mut(id) {
            Some(session) => {
                session.on_run_completed(completion);
                Some(id)
            }
            None => {
                debug!(session = %id, "dropping report for closed session");
                None
            }
        }
    }

    /// Wait for the next countdown expiry or run report and apply it.
    ///
    /// Returns the sessions whose state changed. Cancel-safe: dropping the
    /// future before it completes loses nothing, so it can sit in a
    /// `select!` next to terminal input.
    pub async fn turn(&mut self) -> Vec<SessionId> {
        let deadline = self.next_deadline();
        let wake = tokio::select! {
            Some(completion) = self.rx.recv() => Wake::Completed(completion),
            () = sleep_until(deadline) => Wake::Timer,
        };
        match wake {
            Wake::Completed(completion) => self.deliver(completion).into_iter().collect(),
            Wake::Timer => self.fire_due(Instant::now()),
        }
    }

    /// Close one session, killing its run and removing its workspace.
    pub async fn close(&mut self, id: SessionId) -> EviewResult<bool> {
        let Some(position) = self.sessions.iter().position(|session| session.id() == id) else {
            return Ok(false);
        };
        let session = self.sessions.remove(position);
        if self.active == Some(id) {
            self.active = self.sessions.first().map(Session::id);
        }
        session.close().await?;
        Ok(true)
    }

    /// Close every session. All are closed even if one fails; the first
    /// failure is returned.
    pub async fn shutdown(self) -> EviewResult<()> {
        let mut first_error = None;
        for session in self.sessions {
            let id = session.id();
            if let Err(err) = session.close().await {
                warn!(session = %id, %err, "session cleanup failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
