//! eview: a live-preview engine for scripts rendered by external commands.
//!
//! Each preview [`session::Session`] owns a scratch [`workspace::Workspace`], a
//! [`scheduler::Debounce`] countdown, and at most one in-flight render run. Edits
//! are coalesced by the debounce, the buffers are written to disk, the user's
//! render command is launched as `cmd <script> <output>`, and the classified
//! [`model::RunResult`] is pushed back to the session's display and log.
//!
//! Sessions are grouped in a [`registry::Registry`], which is driven one
//! cooperative step at a time with [`registry::Registry::turn`].

#![forbid(unsafe_code)]
// Accessors and error variants are self-describing; modules carry the docs.
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod surface;
pub mod workspace;

pub use crate::config::EngineConfig;
pub use crate::error::{EviewError, EviewResult, PathError};
pub use crate::model::*;
pub use crate::registry::Registry;
pub use crate::session::{Session, SessionState};
pub use crate::surface::{Display, DisplayError, Editor, ImageSlot, TextBuffer};
