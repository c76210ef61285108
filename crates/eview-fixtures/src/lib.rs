//! Test fixtures for eview.
//!
//! Render commands in tests are plain `/bin/sh` scripts. [`RenderCommand`]
//! builds them with scripted output, exit status and artifact behavior;
//! [`helpers`] has the filesystem odds and ends.

pub mod builders;
pub mod helpers;

pub use builders::{sh_quote, RenderCommand};
pub use helpers::{temp_dir, write_executable, TINY_PNG};
