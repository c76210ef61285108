//! Child process plumbing for a single render run.

use crate::model::RunRequest;
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use std::io::{self, Read};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawn attempts when the freshly written command file is still busy.
const SPAWN_ATTEMPTS: u32 = 5;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(20);

/// A launched command with its merged stdout/stderr being collected.
pub(crate) struct RunningProcess {
    child: Child,
    output: JoinHandle<io::Result<Vec<u8>>>,
}

impl RunningProcess {
    /// Launch `command_path script_path output_path` with stderr folded
    /// into stdout and no stdin.
    ///
    /// The child leads its own process group so that a kill reaches the
    /// render tool the command wraps, not only the wrapper shell.
    pub(crate) async fn launch(request: &RunRequest) -> Result<Self, String> {
        let (reader, writer) =
            os_pipe::pipe().map_err(|err| format!("failed to create output pipe: {err}"))?;

        let mut attempts = 0;
        let child = loop {
            attempts += 1;
            let mut command = build_command(request, &writer)
                .map_err(|err| format!("failed to set up output pipe: {err}"))?;
            match command.spawn() {
                Ok(child) => break child,
                // ETXTBSY: another thread's fork may still hold the file we just wrote.
                Err(err) if is_text_busy(&err) && attempts < SPAWN_ATTEMPTS => {
                    debug!(attempts, "command file busy, retrying spawn");
                    tokio::time::sleep(SPAWN_RETRY_DELAY).await;
                }
                Err(err) => return Err(launch_reason(&request.command_path, &err)),
            }
        };
        // The parent's write end must be closed or the reader never sees EOF.
        drop(writer);

        let output = tokio::task::spawn_blocking(move || {
            let mut reader = reader;
            let mut captured = Vec::new();
            reader.read_to_end(&mut captured)?;
            Ok(captured)
        });

        Ok(Self { child, output })
    }

    pub(crate) fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the command itself to exit.
    pub(crate) async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Collected output, decoded lossily.
    pub(crate) async fn captured_output(self) -> String {
        match self.output.await {
            Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Err(err)) => format!("<failed to read command output: {err}>"),
            Err(err) => format!("<output collector stopped: {err}>"),
        }
    }

    /// SIGTERM the process group, then SIGKILL it if still alive after `grace`.
    pub(crate) async fn terminate(&mut self, grace: Duration) {
        #[cfg(unix)]
        if let Some(pgid) = self.id().and_then(|pid| i32::try_from(pid).ok()) {
            let pgid = Pid::from_raw(pgid);
            signal_process_group(pgid, Signal::SIGTERM);
            if tokio::time::timeout(grace, self.child.wait()).await.is_ok() {
                return;
            }
            signal_process_group(pgid, Signal::SIGKILL);
            let _ = self.child.wait().await;
            return;
        }

        let _ = self.child.kill().await;
    }
}

fn build_command(request: &RunRequest, writer: &os_pipe::PipeWriter) -> io::Result<Command> {
    let mut command = Command::new(&request.command_path);
    command
        .arg(&request.script_path)
        .arg(&request.output_path)
        .stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer.try_clone()?)
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    Ok(command)
}

#[cfg(unix)]
fn signal_process_group(pgid: Pid, signal: Signal) {
    match killpg(pgid, signal) {
        // ESRCH: the group is already gone.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => debug!(%err, ?signal, "failed to signal process group"),
    }
}

fn is_text_busy(err: &io::Error) -> bool {
    err.raw_os_error() == Some(Errno::ETXTBSY as i32)
}

fn launch_reason(command_path: &Path, err: &io::Error) -> String {
    let detail = match err.kind() {
        io::ErrorKind::NotFound => {
            "command or its interpreter was not found (check the #! line)".to_string()
        }
        io::ErrorKind::PermissionDenied => "command is not executable".to_string(),
        _ if err.raw_os_error() == Some(Errno::ENOEXEC as i32) => {
            "command is not a recognised executable (missing #! line?)".to_string()
        }
        _ => err.to_string(),
    };
    format!("failed to launch {}: {detail}", command_path.display())
}
