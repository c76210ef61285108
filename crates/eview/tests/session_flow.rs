// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::uninlined_format_args)]
#![allow(missing_docs)]
#![cfg(unix)]

//! End-to-end session behavior with real render commands.
//!
//! Every test drives a single `Custom` session through [`Registry::turn`]
//! with a short debounce, using `/bin/sh` commands from `eview-fixtures`.

use eview::{
    BufferKind, Display, EngineConfig, ImageSlot, PathKind, Preset, Registry, RunResult,
    SessionId, SessionState, TextBuffer,
};
use eview_fixtures::{temp_dir, write_executable, RenderCommand};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const DEBOUNCE_MS: u64 = 40;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

struct Harness {
    registry: Registry<ImageSlot>,
    id: SessionId,
    scratch: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(tweak: impl FnOnce(&mut EngineConfig)) -> Self {
        let scratch = temp_dir("flow");
        let mut config = EngineConfig {
            debounce_ms: DEBOUNCE_MS,
            scratch_root: Some(scratch.path().to_path_buf()),
            ..EngineConfig::default()
        };
        tweak(&mut config);
        let registry =
            Registry::with_presets(config, &[Preset::Custom], |_| ImageSlot::new()).unwrap();
        let id = registry.active().unwrap();
        Self {
            registry,
            id,
            scratch,
        }
    }

    fn file(&self, name: &str) -> std::path::PathBuf {
        self.scratch.path().join(name)
    }

    fn session(&self) -> &eview::Session<ImageSlot> {
        self.registry.get(self.id).unwrap()
    }

    fn edit(&mut self, which: BufferKind, text: &str) {
        let id = self.id;
        self.registry
            .get_mut(id)
            .unwrap()
            .on_buffer_changed(which, &TextBuffer::new(text));
    }

    fn set_command(&mut self, command: &RenderCommand) {
        self.edit(BufferKind::Command, &command.build());
    }

    async fn settle(&mut self) {
        let waited = tokio::time::timeout(SETTLE_TIMEOUT, async {
            while !self.registry.is_quiescent() {
                self.registry.turn().await;
            }
        })
        .await;
        assert!(waited.is_ok(), "session did not settle");
    }

    async fn wait_until_running(&mut self) {
        let id = self.id;
        let waited = tokio::time::timeout(SETTLE_TIMEOUT, async {
            while self.registry.get(id).unwrap().state() != SessionState::Running {
                self.registry.turn().await;
            }
        })
        .await;
        assert!(waited.is_ok(), "run never started");
    }

    fn result(&self) -> &RunResult {
        self.session().last_result().expect("no result applied")
    }
}

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn successful_render_shows_image_and_output() {
    let mut h = Harness::new();
    h.set_command(
        &RenderCommand::new()
            .stdout("plotting")
            .stderr("warning: tiny")
            .write_png(),
    );
    h.edit(BufferKind::Script, "plot sin(x)");
    h.settle().await;

    let output = h.session().path(PathKind::Output).to_path_buf();
    assert_eq!(h.result().image_path(), Some(&output));
    assert_eq!(h.session().display().current(), Some(output.as_path()));
    assert!(h.session().log().contains("plotting"));
    assert!(h.session().log().contains("warning: tiny"));
    assert_eq!(h.session().state(), SessionState::Idle);
}

#[tokio::test]
async fn burst_of_edits_renders_once_with_final_text() {
    let mut h = Harness::new();
    let log = h.file("runs.log");
    h.set_command(&RenderCommand::new().record_script(&log));
    for text in ["p", "pl", "plo", "plot", "plot x"] {
        h.edit(BufferKind::Script, text);
    }
    h.settle().await;

    assert_eq!(lines(&log), vec!["plot x".to_string()]);
    assert_eq!(h.session().runs_started(), 1);
}

#[tokio::test]
async fn edits_during_a_run_cause_exactly_one_follow_up() {
    let mut h = Harness::new();
    let log = h.file("runs.log");
    let overlap = h.file("overlap.log");
    let lock = h.file("lock");
    h.set_command(
        &RenderCommand::new()
            .exclusive(&lock, &overlap)
            .record_script(&log)
            .sleep_ms(300)
            .echo_script(),
    );
    h.edit(BufferKind::Script, "first");
    h.wait_until_running().await;

    h.edit(BufferKind::Script, "second");
    h.edit(BufferKind::Script, "third");
    assert_eq!(h.session().state(), SessionState::Running);
    h.settle().await;

    assert_eq!(lines(&log), vec!["first".to_string(), "third".to_string()]);
    assert!(!overlap.exists(), "runs overlapped");
    assert_eq!(h.session().runs_started(), 2);
    assert_eq!(h.result().log_text(), "third");
}

#[tokio::test]
async fn empty_script_never_runs() {
    let mut h = Harness::new();
    let log = h.file("runs.log");
    h.set_command(&RenderCommand::new().record_script(&log));
    h.edit(BufferKind::Script, "");
    h.settle().await;

    assert!(!log.exists());
    assert_eq!(h.session().runs_started(), 0);
    assert!(h.session().last_result().is_none());
    assert_eq!(h.session().display().clears(), 0);

    // The guard must not wedge the session.
    h.edit(BufferKind::Script, "now");
    h.settle().await;
    assert_eq!(lines(&log), vec!["now".to_string()]);
}

#[tokio::test]
async fn missing_interpreter_is_a_launch_error() {
    let mut h = Harness::new();
    h.set_command(&RenderCommand::missing_interpreter());
    h.edit(BufferKind::Script, "x^2");
    h.settle().await;

    let RunResult::LaunchError { reason } = h.result() else {
        panic!("expected launch error, got {:?}", h.result());
    };
    assert!(!reason.is_empty());
    assert_eq!(h.session().log(), reason);
    assert!(h.session().display().current().is_none());
    assert_eq!(h.session().state(), SessionState::Idle);
}

#[tokio::test]
async fn failing_render_clears_previous_image() {
    let mut h = Harness::new();
    h.set_command(&RenderCommand::new().write_png());
    h.edit(BufferKind::Script, "good");
    h.settle().await;
    assert!(h.session().display().current().is_some());

    h.set_command(
        &RenderCommand::new()
            .stderr("syntax error near line 1")
            .exit_code(2),
    );
    h.settle().await;

    assert_eq!(
        h.result(),
        &RunResult::ProcessFailure {
            captured_output: "syntax error near line 1\n".to_string(),
            exit_code: Some(2),
        }
    );
    assert!(h.session().display().current().is_none());
}

#[tokio::test]
async fn empty_output_file_is_success_without_image() {
    let mut h = Harness::new();
    h.set_command(&RenderCommand::new().touch_output());
    h.edit(BufferKind::Script, "blank");
    h.settle().await;

    assert!(matches!(
        h.result(),
        RunResult::Success {
            image_path: None,
            ..
        }
    ));
    assert!(h.session().display().current().is_none());
}

#[tokio::test]
async fn unchanged_buffers_render_identically() {
    let mut h = Harness::new();
    h.set_command(&RenderCommand::new().echo_script().write_png());
    h.edit(BufferKind::Script, "same");
    h.settle().await;
    let first = h.result().clone();

    h.edit(BufferKind::Script, "same");
    h.settle().await;

    assert_eq!(h.result(), &first);
    assert_eq!(h.session().runs_started(), 2);
}

#[tokio::test]
async fn script_redirect_loads_file_and_renders_it() {
    let mut h = Harness::new();
    let log = h.file("runs.log");
    let script = h.file("figure.gp");
    fs::write(&script, "plot tan(x)").unwrap();
    h.set_command(&RenderCommand::new().record_script(&log));

    let id = h.id;
    h.registry
        .get_mut(id)
        .unwrap()
        .on_path_changed(PathKind::Script, &script)
        .unwrap();
    h.settle().await;

    assert_eq!(h.session().buffer(BufferKind::Script), "plot tan(x)");
    assert_eq!(lines(&log), vec!["plot tan(x)".to_string()]);

    // Later edits are persisted to the redirected file.
    h.edit(BufferKind::Script, "plot atan(x)");
    h.settle().await;
    assert_eq!(fs::read_to_string(&script).unwrap(), "plot atan(x)");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn redirect_to_unwritable_file_keeps_previous_script() {
    let mut h = Harness::new();
    let log = h.file("runs.log");
    h.set_command(&RenderCommand::new().record_script(&log));
    h.edit(BufferKind::Script, "plot x");
    let before = h.session().path(PathKind::Script).to_path_buf();

    let id = h.id;
    let redirected = h
        .registry
        .get_mut(id)
        .unwrap()
        .on_path_changed(PathKind::Script, Path::new("/proc/version"));
    h.settle().await;

    assert!(redirected.is_err());
    assert_eq!(h.session().path(PathKind::Script), before);
    assert_eq!(h.session().buffer(BufferKind::Script), "plot x");
    assert!(h.session().notice().unwrap().contains("/proc/version"));
    assert!(matches!(h.result(), RunResult::Success { .. }));
    assert_eq!(lines(&log), vec!["plot x".to_string()]);
}

#[tokio::test]
async fn command_redirect_prefers_existing_file() {
    let mut h = Harness::new();
    let command = h.file("render.sh");
    write_executable(&command, &RenderCommand::new().stdout("from disk").build());
    h.edit(BufferKind::Script, "x");

    let id = h.id;
    h.registry
        .get_mut(id)
        .unwrap()
        .on_path_changed(PathKind::Command, &command)
        .unwrap();
    h.settle().await;

    assert!(h.session().buffer(BufferKind::Command).contains("from disk"));
    assert_eq!(h.session().log(), "from disk\n");
    assert!(h.session().notice().is_none());
}

#[tokio::test]
async fn output_redirect_moves_the_image() {
    let mut h = Harness::new();
    let target = h.file("figure.png");
    h.set_command(&RenderCommand::new().write_png());
    let id = h.id;
    h.registry
        .get_mut(id)
        .unwrap()
        .on_path_changed(PathKind::Output, &target)
        .unwrap();
    h.settle().await;

    assert_eq!(h.result().image_path(), Some(&target));
    assert!(fs::metadata(&target).unwrap().len() > 0);
}

#[tokio::test]
async fn stale_run_is_cancelled_when_enabled() {
    let mut h = Harness::with_config(|config| config.cancel_stale_runs = true);
    let log = h.file("runs.log");
    h.set_command(
        &RenderCommand::new()
            .record_script(&log)
            .sleep_ms(5_000)
            .echo_script(),
    );
    h.edit(BufferKind::Script, "old");
    h.wait_until_running().await;
    // Give the shell time to record its start.
    tokio::time::sleep(Duration::from_millis(100)).await;

    h.set_command(&RenderCommand::new().record_script(&log).echo_script());
    h.edit(BufferKind::Script, "new");
    h.settle().await;

    assert_eq!(lines(&log), vec!["old".to_string(), "new".to_string()]);
    assert_eq!(h.result().log_text(), "new");
    assert_eq!(h.session().runs_started(), 2);
}

#[tokio::test]
async fn closing_a_running_session_removes_its_workspace() {
    let mut h = Harness::new();
    h.set_command(&RenderCommand::new().sleep_ms(5_000));
    h.edit(BufferKind::Script, "slow");
    h.wait_until_running().await;
    let root = h.session().workspace().root().to_path_buf();

    let closed = tokio::time::timeout(Duration::from_secs(3), h.registry.close(h.id)).await;

    assert!(closed.unwrap().unwrap());
    assert!(!root.exists());
    assert!(h.registry.is_empty());
}
