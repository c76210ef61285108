//! eview CLI: edit a script, watch its rendering update live.
//!
//! `eview [FILENAME]` opens the terminal frontend. A `.gp`/`.gnuplot` file
//! opens in the gnuplot tab, a `.tex` file in the tex2im math tab.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]

mod app;
mod editor;
mod preview;

use clap::Parser;
use eview::EngineConfig;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter. Logging is off when unset.
const LOG_ENV: &str = "EVIEW_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "eview",
    version,
    about = "Live preview for scripts rendered by gnuplot, tex2im or any command"
)]
struct Cli {
    /// Script to open; its extension picks the tab
    filename: Option<PathBuf>,
}

/// Configure miette's report colors from the terminal and `NO_COLOR`.
fn configure_colors() {
    let use_color = std::env::var_os("NO_COLOR").is_none()
        && supports_color::on(supports_color::Stream::Stderr).is_some();
    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
}

/// Send logs to a file; the terminal belongs to the frontend.
fn init_logging(config: &EngineConfig) -> Result<()> {
    let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) else {
        return Ok(());
    };
    let path = config
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("eview.log"));
    let file = File::create(&path).into_diagnostic()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| miette::miette!("failed to install logger: {err}"))?;
    tracing::info!(log = %path.display(), "logging enabled");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_colors();

    let config = EngineConfig::discover()?;
    init_logging(&config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime.block_on(app::run(config, cli.filename))
}
