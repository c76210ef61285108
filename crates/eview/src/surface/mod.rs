//! Capabilities a frontend provides to a session.
//!
//! The engine never renders text or pixels itself. It reads and replaces
//! editor text through [`Editor`] and hands image paths to a [`Display`].
//! [`TextBuffer`] and [`ImageSlot`] are minimal in-memory implementations.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// An editable text surface.
pub trait Editor {
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);
}

/// The image could not be shown (unreadable, corrupt, partially written).
#[derive(Debug, Error)]
#[error("cannot display {}: {reason}", path.display())]
pub struct DisplayError {
    pub path: PathBuf,
    pub reason: String,
}

impl DisplayError {
    pub fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// An image surface.
pub trait Display {
    /// Show the image at `path`.
    fn show(&mut self, path: &Path) -> Result<(), DisplayError>;
    /// Show nothing.
    fn clear(&mut self);
    /// The image currently shown, if any.
    fn current(&self) -> Option<&Path>;
}

/// Plain string editor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Editor for TextBuffer {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        text.clone_into(&mut self.text);
    }
}

/// Display that remembers the shown path and counts updates.
///
/// Rejects paths that do not exist, like a real image widget would.
#[derive(Clone, Debug, Default)]
pub struct ImageSlot {
    current: Option<PathBuf>,
    shows: usize,
    clears: usize,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful `show` calls so far.
    pub fn shows(&self) -> usize {
        self.shows
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl Display for ImageSlot {
    fn show(&mut self, path: &Path) -> Result<(), DisplayError> {
        if !path.is_file() {
            return Err(DisplayError::new(path, "no such image file"));
        }
        self.current = Some(path.to_path_buf());
        self.shows += 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.current = None;
        self.clears += 1;
    }

    fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_buffer_round_trips() {
        let mut buffer = TextBuffer::new("a");
        buffer.set_text("plot sin(x)");
        assert_eq!(buffer.text(), "plot sin(x)");
    }

    #[test]
    fn image_slot_rejects_missing_files() {
        let mut slot = ImageSlot::new();
        let err = slot.show(Path::new("/no/such/out.png")).unwrap_err();
        assert!(err.to_string().contains("/no/such/out.png"));
        assert!(slot.current().is_none());
        assert_eq!(slot.shows(), 0);
    }

    #[test]
    fn image_slot_tracks_current_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("out.png");
        std::fs::write(&image, b"png").unwrap();

        let mut slot = ImageSlot::new();
        slot.show(&image).unwrap();
        assert_eq!(slot.current(), Some(image.as_path()));
        slot.clear();
        assert!(slot.current().is_none());
        assert_eq!((slot.shows(), slot.clears()), (1, 1));
    }
}
