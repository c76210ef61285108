//! One live-preview pipeline (one tab).
//!
//! A [`Session`] owns a [`Workspace`], a [`Debounce`] countdown, the
//! command/script buffer pair, a [`Display`], and at most one in-flight run.
//! Frontend events come in through the `on_*` methods; the registry calls
//! [`Session::poll_timer`] when the countdown may have expired and
//! [`Session::on_run_completed`] when a run task reports back.
//!
//! # State machine
//!
//! ```text
//! Idle --edit--> Pending --timer--> Running --result applied--> Idle
//!                  ^  |                 |
//!                  +--+ (edit)          +--(edited mid-run)--> Pending
//! ```
//!
//! The countdown is paused for the whole run. Edits made while `Running`
//! only re-arm it, so exactly one follow-up run starts after the current one
//! is applied, however many edits arrived.

use crate::config::EngineConfig;
use crate::error::{EviewResult, PathError};
use crate::model::{
    BufferKind, Completion, PathKind, Preset, RunId, RunOutcome, RunRequest, RunResult, SessionId,
};
use crate::runner::{self, Preparation};
use crate::scheduler::Debounce;
use crate::surface::{Display, Editor};
use crate::workspace::Workspace;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Log text shown while a command runs.
pub const RUNNING_LOG: &str = "Running...";

/// Coarse lifecycle state, derived from the countdown and the in-flight run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No pending or running work.
    Idle,
    /// A countdown is armed.
    Pending,
    /// A command is running.
    Running,
}

struct InFlight {
    run_id: RunId,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl InFlight {
    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        // Dropping the run future drops the child, which is spawned kill-on-drop.
        self.task.abort();
    }
}

/// A live-preview session rendering into a `D`.
pub struct Session<D: Display> {
    id: SessionId,
    preset: Preset,
    workspace: Workspace,
    command_text: String,
    script_text: String,
    debounce: Debounce,
    display: D,
    log: String,
    notice: Option<String>,
    last_result: Option<RunResult>,
    runs_started: u64,
    shown: bool,
    in_flight: Option<InFlight>,
    completions: mpsc::UnboundedSender<Completion>,
    cancel_stale_runs: bool,
    kill_grace: Duration,
}

impl<D: Display> Session<D> {
    /// Open a session with the preset's default buffers and a fresh workspace.
    ///
    /// Completed runs are reported on `completions`.
    pub fn new(
        preset: Preset,
        config: &EngineConfig,
        display: D,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> EviewResult<Self> {
        let workspace = Workspace::create(config.scratch_root.as_deref())?;
        let id = SessionId::new();
        debug!(session = %id, %preset, root = %workspace.root().display(), "session opened");
        Ok(Self {
            id,
            preset,
            workspace,
            command_text: preset.default_command().to_string(),
            script_text: preset.default_script().to_string(),
            debounce: Debounce::new(config.debounce()),
            display,
            log: String::new(),
            notice: None,
            last_result: None,
            runs_started: 0,
            shown: false,
            in_flight: None,
            completions,
            cancel_stale_runs: config.cancel_stale_runs,
            kill_grace: config.kill_grace(),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn path(&self, which: PathKind) -> &Path {
        self.workspace.path(which)
    }

    pub fn buffer(&self, which: BufferKind) -> &str {
        match which {
            BufferKind::Command => &self.command_text,
            BufferKind::Script => &self.script_text,
        }
    }

    /// Copy a buffer into an editor, e.g. after a redirect replaced it.
    pub fn load_into(&self, which: BufferKind, editor: &mut dyn Editor) {
        editor.set_text(self.buffer(which));
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Output pane text: captured output, launch failure, or `Running...`.
    pub fn log(&self) -> &str {
        &self.log
    }

    /// Transient message from the last failed redirect.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn last_result(&self) -> Option<&RunResult> {
        self.last_result.as_ref()
    }

    /// Runs that got past the empty-script check.
    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.is_some() {
            SessionState::Running
        } else if self.debounce.is_armed() {
            SessionState::Pending
        } else {
            SessionState::Idle
        }
    }

    /// When the armed countdown expires, if it is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// The editor for `which` changed: take its text and restart the countdown.
    pub fn on_buffer_changed(&mut self, which: BufferKind, editor: &dyn Editor) {
        let text = editor.text();
        match which {
            BufferKind::Command => self.command_text = text,
            BufferKind::Script => self.script_text = text,
        }
        self.touch();
    }

    /// Rebind one of the workspace paths.
    ///
    /// For command/script the buffer is replaced by the file's content if it
    /// exists (call [`load_into`](Self::load_into) to refresh the editor), or
    /// written out otherwise. A failure keeps the old path and sets
    /// [`notice`](Self::notice).
    pub fn on_path_changed(&mut self, which: PathKind, path: &Path) -> Result<(), PathError> {
        let current = match which.buffer() {
            Some(BufferKind::Command) => self.command_text.as_str(),
            Some(BufferKind::Script) => self.script_text.as_str(),
            None => "",
        };
        match self.workspace.redirect(which, path, current) {
            Ok(resolved) => {
                if let (Some(kind), Some(text)) = (which.buffer(), resolved) {
                    match kind {
                        BufferKind::Command => self.command_text = text,
                        BufferKind::Script => self.script_text = text,
                    }
                }
                self.notice = None;
                self.touch();
                Ok(())
            }
            Err(err) => {
                warn!(session = %self.id, %which, path = %path.display(), error = %err.source, "redirect failed");
                self.notice = Some(err.notice());
                Err(err)
            }
        }
    }

    /// Render without waiting for the quiet period. During a run, the
    /// follow-up run starts right after the current one is applied.
    pub fn render_now(&mut self) {
        self.debounce.fire_now(Instant::now());
    }

    /// The session became visible. The first time, start the countdown so
    /// the initial buffers get rendered.
    pub fn on_shown(&mut self) {
        if self.shown {
            return;
        }
        self.shown = true;
        self.debounce.start(Instant::now());
    }

    /// Fire the countdown if it has expired. Returns whether it fired.
    pub fn poll_timer(&mut self, now: Instant) -> bool {
        if self.debounce.poll(now) {
            self.on_timer_fired();
            true
        } else {
            false
        }
    }

    /// Snapshot the buffers and start a run.
    ///
    /// The countdown stays paused until the run's result is applied. An empty
    /// script produces no run and no result.
    pub fn on_timer_fired(&mut self) {
        let now = Instant::now();
        self.debounce.pause(now);
        if self.in_flight.is_some() {
            // Never overlap runs: owe one after the current run instead.
            self.debounce.reset(now);
            return;
        }

        let request = self.snapshot();
        match runner::prepare(&request) {
            Preparation::EmptyScript => {
                debug!(session = %self.id, "script is empty, skipping run");
                self.debounce.resume(now);
            }
            Preparation::Failed(result) => {
                self.runs_started += 1;
                self.apply_result(result);
                self.debounce.resume(now);
            }
            Preparation::Ready => {
                self.runs_started += 1;
                self.display.clear();
                RUNNING_LOG.clone_into(&mut self.log);
                self.in_flight = Some(self.spawn_run(request));
            }
        }
    }

    /// Apply a run task's report and re-enable the countdown.
    pub fn on_run_completed(&mut self, completion: Completion) {
        let current = self.in_flight.as_ref().map(|run| run.run_id);
        if current != Some(completion.run_id) {
            debug!(session = %self.id, run = %completion.run_id, "ignoring report from a stale run");
            return;
        }
        self.in_flight = None;
        match completion.outcome {
            RunOutcome::Finished(result) => self.apply_result(result),
            RunOutcome::Cancelled => {
                debug!(session = %self.id, run = %completion.run_id, "run cancelled, no result");
            }
        }
        self.debounce.resume(Instant::now());
    }

    /// Stop any running command and remove the workspace.
    pub async fn close(self) -> EviewResult<()> {
        let Self {
            id,
            workspace,
            in_flight,
            ..
        } = self;
        if let Some(mut run) = in_flight {
            run.cancel();
            let _ = (&mut run.task).await;
        }
        workspace.destroy()?;
        debug!(session = %id, "session closed");
        Ok(())
    }

    fn touch(&mut self) {
        let now = Instant::now();
        if self.cancel_stale_runs {
            if let Some(run) = self.in_flight.as_mut() {
                debug!(session = %self.id, run = %run.run_id, "edit supersedes running command");
                run.cancel();
            }
        }
        self.debounce.reset(now);
    }

    fn snapshot(&self) -> RunRequest {
        RunRequest {
            run_id: RunId::new(),
            session_id: self.id,
            command_text: self.command_text.clone(),
            script_text: self.script_text.clone(),
            command_path: self.workspace.path(PathKind::Command).to_path_buf(),
            script_path: self.workspace.path(PathKind::Script).to_path_buf(),
            output_path: self.workspace.path(PathKind::Output).to_path_buf(),
        }
    }

    fn spawn_run(&self, request: RunRequest) -> InFlight {
        let (cancel, cancelled) = oneshot::channel();
        let completions = self.completions.clone();
        let kill_grace = self.kill_grace;
        let run_id = request.run_id;
        let session_id = request.session_id;
        let task = tokio::spawn(async move {
            let outcome = runner::execute(request, cancelled, kill_grace).await;
            // The registry may already be gone during shutdown.
            let _ = completions.send(Completion {
                session_id,
                run_id,
                outcome,
            });
        });
        InFlight {
            run_id,
            cancel: Some(cancel),
            task,
        }
    }

    fn apply_result(&mut self, result: RunResult) {
        result.log_text().clone_into(&mut self.log);
        if let Some(image) = result.image_path() {
            if let Err(err) = self.display.show(image) {
                warn!(session = %self.id, %err, "rendered image could not be displayed");
                self.display.clear();
            }
        }
        debug!(session = %self.id, result = result.label(), "result applied");
        self.last_result = Some(result);
    }
}
