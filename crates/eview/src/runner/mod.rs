//! Run coordinator: turns one [`RunRequest`] into at most one [`RunResult`].
//!
//! A run happens in two halves. [`prepare`] is synchronous: it checks the
//! empty-script precondition and writes the command (owner-only `rwx`) and
//! script files. [`execute`] is the single suspension point: it launches the
//! command as `command_path script_path output_path` with stderr merged
//! into stdout, awaits its exit, and classifies the result.

mod process;

use crate::model::{RunOutcome, RunRequest, RunResult};
use process::RunningProcess;
use std::fs;
use std::io;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Result of the synchronous half of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Preparation {
    /// Files are on disk; the command may be launched.
    Ready,
    /// The script is empty: nothing to render, no result is produced.
    EmptyScript,
    /// The files could not be written. The run ends here with this result.
    Failed(RunResult),
}

/// Check preconditions and persist the request's buffers.
pub fn prepare(request: &RunRequest) -> Preparation {
    if request.script_text.is_empty() {
        return Preparation::EmptyScript;
    }
    match persist(request) {
        Ok(()) => Preparation::Ready,
        Err(reason) => Preparation::Failed(RunResult::LaunchError { reason }),
    }
}

fn persist(request: &RunRequest) -> Result<(), String> {
    fs::write(&request.command_path, &request.command_text).map_err(|err| {
        format!(
            "failed to write command file {}: {err}",
            request.command_path.display()
        )
    })?;
    mark_owner_executable(&request.command_path).map_err(|err| {
        format!(
            "failed to mark {} executable: {err}",
            request.command_path.display()
        )
    })?;
    fs::write(&request.script_path, &request.script_text).map_err(|err| {
        format!(
            "failed to write script file {}: {err}",
            request.script_path.display()
        )
    })
}

#[cfg(unix)]
fn mark_owner_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn mark_owner_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Launch the prepared command and wait for it.
///
/// Firing `cancel` kills the command's process group (SIGTERM, then SIGKILL
/// after `kill_grace`) and yields [`RunOutcome::Cancelled`]. Dropping the
/// sender does not cancel.
pub async fn execute(
    request: RunRequest,
    cancel: oneshot::Receiver<()>,
    kill_grace: Duration,
) -> RunOutcome {
    let span = info_span!(
        "run",
        session = %request.session_id.short(),
        run = %request.run_id.short()
    );
    run_to_completion(request, cancel, kill_grace)
        .instrument(span)
        .await
}

async fn run_to_completion(
    request: RunRequest,
    mut cancel: oneshot::Receiver<()>,
    kill_grace: Duration,
) -> RunOutcome {
    let started = Instant::now();
    let mut process = match RunningProcess::launch(&request).await {
        Ok(process) => process,
        Err(reason) => {
            warn!(%reason, "command failed to launch");
            return RunOutcome::Finished(RunResult::LaunchError { reason });
        }
    };
    info!(pid = process.id(), command = %request.command_path.display(), "command launched");

    let status = tokio::select! {
        status = process.wait() => status,
        Ok(()) = &mut cancel => {
            process.terminate(kill_grace).await;
            info!(elapsed_ms = elapsed_ms(started), "run cancelled");
            return RunOutcome::Cancelled;
        }
    };

    let captured_output = process.captured_output().await;
    let result = match status {
        Ok(status) => classify(status, captured_output, &request.output_path),
        Err(err) => RunResult::LaunchError {
            reason: format!("failed to wait for command: {err}"),
        },
    };
    info!(
        result = result.label(),
        exit_code = status_code(&result),
        elapsed_ms = elapsed_ms(started),
        "run finished"
    );
    RunOutcome::Finished(result)
}

/// Exit status nonzero is a failure; exit zero is a success whose image is
/// present only when the output file exists and is non-empty.
pub fn classify(status: ExitStatus, captured_output: String, output_path: &Path) -> RunResult {
    if !status.success() {
        return RunResult::ProcessFailure {
            captured_output,
            exit_code: status.code(),
        };
    }
    let image_path = artifact_present(output_path).then(|| output_path.to_path_buf());
    RunResult::Success {
        captured_output,
        image_path,
    }
}

fn artifact_present(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

fn status_code(result: &RunResult) -> Option<i32> {
    match result {
        RunResult::Success { .. } => Some(0),
        RunResult::ProcessFailure { exit_code, .. } => *exit_code,
        RunResult::LaunchError { .. } => None,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
