//! Per-session scratch directory and file bindings.
//!
//! A [`Workspace`] exclusively owns a fresh temporary directory holding the
//! default command (`run`), script (`in.txt`) and output (`out.png`) files.
//! Each binding can be redirected to an arbitrary path; a redirected file is
//! then owned by whoever named it and survives [`Workspace::destroy`].

use crate::error::{EviewError, EviewResult, PathError};
use crate::model::PathKind;
#[cfg(unix)]
use nix::unistd::{access, AccessFlags};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

pub const COMMAND_FILE: &str = "run";
pub const SCRIPT_FILE: &str = "in.txt";
pub const OUTPUT_FILE: &str = "out.png";

const DIR_PREFIX: &str = "eview-";

#[derive(Debug)]
pub struct Workspace {
    root: TempDir,
    command_path: PathBuf,
    script_path: PathBuf,
    output_path: PathBuf,
}

impl Workspace {
    /// Allocate a fresh, uniquely named directory under `scratch_root`
    /// (the system temp dir when `None`).
    pub fn create(scratch_root: Option<&Path>) -> EviewResult<Self> {
        let parent = scratch_root.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let root = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(&parent)
            .map_err(|source| EviewError::Workspace {
                parent: parent.clone(),
                source,
            })?;
        let dir = root.path().to_path_buf();
        debug!(root = %dir.display(), "workspace created");
        Ok(Self {
            command_path: dir.join(COMMAND_FILE),
            script_path: dir.join(SCRIPT_FILE),
            output_path: dir.join(OUTPUT_FILE),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn path(&self, which: PathKind) -> &Path {
        match which {
            PathKind::Command => &self.command_path,
            PathKind::Script => &self.script_path,
            PathKind::Output => &self.output_path,
        }
    }

    /// Whether the binding still points inside the owned directory.
    pub fn owns(&self, which: PathKind) -> bool {
        self.path(which).starts_with(self.root())
    }

    /// Rebind one path.
    ///
    /// For `Command` and `Script`, an existing target wins and its content is
    /// returned as the new buffer text; otherwise `current` is written there
    /// and returned unchanged. `Output` is write-only, so only its directory
    /// is checked and `None` is returned.
    ///
    /// On error the previous binding is kept.
    pub fn redirect(
        &mut self,
        which: PathKind,
        path: impl AsRef<Path>,
        current: &str,
    ) -> Result<Option<String>, PathError> {
        let requested = path.as_ref();
        let target = std::path::absolute(requested)
            .map_err(|err| PathError::new(which, requested, err))?;

        let resolved = match which.buffer() {
            Some(_) => Some(sync_buffer(which, &target, current)?),
            None => {
                check_output_target(&target).map_err(|err| PathError::new(which, &target, err))?;
                None
            }
        };

        debug!(%which, path = %target.display(), "workspace path redirected");
        match which {
            PathKind::Command => self.command_path = target,
            PathKind::Script => self.script_path = target,
            PathKind::Output => self.output_path = target,
        }
        Ok(resolved)
    }

    /// Remove the owned directory and everything below it.
    ///
    /// Redirected files outside the directory are left alone. Dropping a
    /// workspace without calling this still removes the directory, but
    /// ignores failures.
    pub fn destroy(self) -> EviewResult<()> {
        let path = self.root.path().to_path_buf();
        self.root
            .close()
            .map_err(|source| EviewError::Cleanup {
                path: path.clone(),
                source,
            })?;
        debug!(root = %path.display(), "workspace removed");
        Ok(())
    }
}

/// Disk wins when the file exists, memory wins otherwise.
///
/// An existing file must also take writes, since every run rewrites it.
fn sync_buffer(which: PathKind, target: &Path, current: &str) -> Result<String, PathError> {
    let fail = |err| PathError::new(which, target, err);
    if target.exists() {
        let text = fs::read_to_string(target).map_err(fail)?;
        rewrite_in_place(target, &text).map_err(fail)?;
        Ok(text)
    } else {
        fs::write(target, current).map_err(fail)?;
        Ok(current.to_string())
    }
}

/// Write `text` back over the file it was read from. No truncation, so a
/// failed write leaves the content as it was.
fn rewrite_in_place(target: &Path, text: &str) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).open(target)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}

fn check_output_target(target: &Path) -> io::Result<()> {
    if target.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path is a directory",
        ));
    }
    let parent = target.parent().unwrap_or_else(|| Path::new("/"));
    let meta = fs::metadata(parent)?;
    if !meta.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "parent is not a directory",
        ));
    }
    check_writable(parent, target)
}

#[cfg(unix)]
fn check_writable(parent: &Path, target: &Path) -> io::Result<()> {
    access(parent, AccessFlags::W_OK | AccessFlags::X_OK)?;
    if target.exists() {
        access(target, AccessFlags::W_OK)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_writable(parent: &Path, _target: &Path) -> io::Result<()> {
    if fs::metadata(parent)?.permissions().readonly() {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "parent directory is read-only",
        ));
    }
    Ok(())
}
