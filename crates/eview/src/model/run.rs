use crate::model::{RunId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One of the two editable buffers of a session.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
    /// The render command (an executable script with a shebang).
    Command,
    /// The script handed to the render command.
    Script,
}

/// One of the three file bindings of a workspace.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    /// Where the command buffer is persisted and executed from.
    Command,
    /// Where the script buffer is persisted.
    Script,
    /// Where the command is asked to write its image.
    Output,
}

impl PathKind {
    /// All bindings, in display order.
    pub const ALL: [PathKind; 3] = [PathKind::Script, PathKind::Output, PathKind::Command];

    /// The buffer backing this path, if any. `Output` is write-only.
    pub fn buffer(self) -> Option<BufferKind> {
        match self {
            PathKind::Command => Some(BufferKind::Command),
            PathKind::Script => Some(BufferKind::Script),
            PathKind::Output => None,
        }
    }
}

impl From<BufferKind> for PathKind {
    fn from(kind: BufferKind) -> Self {
        match kind {
            BufferKind::Command => PathKind::Command,
            BufferKind::Script => PathKind::Script,
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathKind::Command => "command",
            PathKind::Script => "script",
            PathKind::Output => "output",
        };
        f.write_str(name)
    }
}

/// Immutable snapshot taken when the debounce fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    pub run_id: RunId,
    pub session_id: SessionId,
    pub command_text: String,
    pub script_text: String,
    pub command_path: PathBuf,
    pub script_path: PathBuf,
    pub output_path: PathBuf,
}

/// Classified outcome of one run that actually started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunResult {
    /// Exit status zero. `image_path` is `None` when the command left no
    /// usable (existing, non-empty) artifact behind.
    Success {
        captured_output: String,
        image_path: Option<PathBuf>,
    },
    /// Nonzero exit status, or terminated by a signal (`exit_code` is `None`).
    ProcessFailure {
        captured_output: String,
        exit_code: Option<i32>,
    },
    /// The command could not be launched at all.
    LaunchError { reason: String },
}

impl RunResult {
    /// Text shown in the session's output pane for this result.
    pub fn log_text(&self) -> &str {
        match self {
            RunResult::Success {
                captured_output, ..
            }
            | RunResult::ProcessFailure {
                captured_output, ..
            } => captured_output,
            RunResult::LaunchError { reason } => reason,
        }
    }

    /// The rendered image, if the run produced one.
    pub fn image_path(&self) -> Option<&PathBuf> {
        match self {
            RunResult::Success { image_path, .. } => image_path.as_ref(),
            RunResult::ProcessFailure { .. } | RunResult::LaunchError { .. } => None,
        }
    }

    /// Short classification label, used in logs and the status line.
    pub fn label(&self) -> &'static str {
        match self {
            RunResult::Success {
                image_path: Some(_),
                ..
            } => "success",
            RunResult::Success {
                image_path: None, ..
            } => "success (no image)",
            RunResult::ProcessFailure { .. } => "process failure",
            RunResult::LaunchError { .. } => "launch error",
        }
    }
}

/// How an in-flight run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run finished (in any classification) and must be applied.
    Finished(RunResult),
    /// The run was superseded and killed; nothing is applied.
    Cancelled,
}

/// Message delivered from a run task back to its session.
#[derive(Clone, Debug)]
pub struct Completion {
    pub session_id: SessionId,
    pub run_id: RunId,
    pub outcome: RunOutcome,
}
