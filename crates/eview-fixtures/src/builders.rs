//! Builder for scripted render commands.
//!
//! ```
//! use eview_fixtures::RenderCommand;
//!
//! let command = RenderCommand::new()
//!     .stdout("rendering")
//!     .stderr("warning: low resolution")
//!     .write_png()
//!     .build();
//! assert!(command.starts_with("#!/bin/sh\n"));
//! ```

use crate::helpers::TINY_PNG;
use std::fmt::Write as _;
use std::path::Path;

/// Single-quote `value` for `/bin/sh`.
#[must_use]
pub fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn png_printf() -> String {
    let mut escaped = String::with_capacity(TINY_PNG.len() * 4);
    for byte in TINY_PNG {
        // write! to String is infallible
        let _ = write!(escaped, "\\{byte:03o}");
    }
    escaped
}

#[derive(Clone, Debug)]
pub struct RenderCommand {
    interpreter: String,
    steps: Vec<String>,
    exclusive: Option<(String, String)>,
    exit_code: i32,
}

impl Default for RenderCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderCommand {
    /// An empty `/bin/sh` command that exits 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interpreter: "/bin/sh".to_string(),
            steps: Vec::new(),
            exclusive: None,
            exit_code: 0,
        }
    }

    /// A command whose `#!` interpreter does not exist, so it cannot launch.
    #[must_use]
    pub fn missing_interpreter() -> Self {
        Self::new().interpreter("/nonexistent/eview-fixture/tex2im")
    }

    #[must_use]
    pub fn interpreter(mut self, path: &str) -> Self {
        self.interpreter = path.to_string();
        self
    }

    /// Print a line on stdout.
    #[must_use]
    pub fn stdout(mut self, line: &str) -> Self {
        self.steps.push(format!("echo {}", sh_quote(line)));
        self
    }

    /// Print a line on stderr.
    #[must_use]
    pub fn stderr(mut self, line: &str) -> Self {
        self.steps.push(format!("echo {} >&2", sh_quote(line)));
        self
    }

    /// Copy the script (`$1`) to stdout.
    #[must_use]
    pub fn echo_script(mut self) -> Self {
        self.steps.push(r#"cat "$1""#.to_string());
        self
    }

    /// Write a valid PNG to the output path (`$2`).
    #[must_use]
    pub fn write_png(mut self) -> Self {
        self.steps.push(format!(r#"printf '{}' > "$2""#, png_printf()));
        self
    }

    /// Create the output path but leave it empty.
    #[must_use]
    pub fn touch_output(mut self) -> Self {
        self.steps.push(r#": > "$2""#.to_string());
        self
    }

    #[must_use]
    pub fn sleep_ms(mut self, millis: u64) -> Self {
        self.steps
            .push(format!("sleep {}.{:03}", millis / 1000, millis % 1000));
        self
    }

    /// Append the script content as one line to `log`, so tests can count
    /// runs and see which buffer state each one used.
    #[must_use]
    pub fn record_script(mut self, log: &Path) -> Self {
        let log = sh_quote(&log.display().to_string());
        self.steps
            .push(format!(r#"printf '%s\n' "$(cat "$1")" >> {log}"#));
        self
    }

    /// Detect overlapping runs: take `lock` (a directory) for the duration of
    /// the command, and append `overlap` to `log` if it is already held.
    #[must_use]
    pub fn exclusive(mut self, lock: &Path, log: &Path) -> Self {
        self.exclusive = Some((
            sh_quote(&lock.display().to_string()),
            sh_quote(&log.display().to_string()),
        ));
        self
    }

    #[must_use]
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Render the command text.
    #[must_use]
    pub fn build(&self) -> String {
        let mut text = format!("#!{}\n", self.interpreter);
        if let Some((lock, log)) = &self.exclusive {
            let _ = writeln!(text, "mkdir {lock} 2>/dev/null || echo overlap >> {log}");
        }
        for step in &self.steps {
            text.push_str(step);
            text.push('\n');
        }
        if let Some((lock, _)) = &self.exclusive {
            let _ = writeln!(text, "rmdir {lock} 2>/dev/null");
        }
        let _ = writeln!(text, "exit {}", self.exit_code);
        text
    }
}
