//! Built-in render presets.
//!
//! A [`Preset`] fixes a session's default command and script and decides
//! which startup files it claims by extension.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const GNUPLOT_COMMAND: &str = r#"#! /bin/bash

gnuplot -e "set term png; set output '${2}'; load '${1}'"
"#;

const GNUPLOT_SCRIPT: &str = r"
plot sin(x)
";

const TEX2IM_MATH_COMMAND: &str = r#"#! /bin/bash
# some useful options
# -B INT : set border width in pixels
# -n :     don't insert equation environment (for non-math latex images)
# -t :     text color
# -b :     background color
# -z :     transparent background

tex2im "${1}" -o "${2}"
"#;

const TEX2IM_MATH_SCRIPT: &str = r"
\div{\vec{E}} = \rho / \epsilon_0
";

const TEX2IM_TIKZ_COMMAND: &str = r#"#! /bin/bash
# some useful options
# -B INT : set border width in pixels
# -n :     don't insert equation environment (for non-math latex images)
# -t :     text color
# -b :     background color
# -z :     transparent background

tex2im -n -B 10 "${1}" -o "${2}"
"#;

const TEX2IM_TIKZ_SCRIPT: &str = r"
\begin{tikzpicture}
\draw (0,0) -- (1,1)
\end{tikzpicture}
";

const CUSTOM_COMMAND: &str = r#"#! /bin/bash
SCRIPT_FILE="${1}"
IMAGE_FILE="${2}"
# insert command that will create an image named ${IMAGE_FILE}
bash ${SCRIPT_FILE}
"#;

const CUSTOM_SCRIPT: &str = r#"
# Edit command script to process this file and then edit this file.
echo "Hello World!"
"#;

/// A built-in (command, script) pair defining a session's rendering tool.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    #[default]
    Gnuplot,
    Tex2imMath,
    Tex2imTikz,
    Custom,
}

impl Preset {
    /// Presets in tab order. The first one is active by default.
    pub const ALL: [Preset; 4] = [
        Preset::Gnuplot,
        Preset::Tex2imMath,
        Preset::Tex2imTikz,
        Preset::Custom,
    ];

    /// Stable identifier, also accepted by [`Preset::from_key`].
    pub fn key(self) -> &'static str {
        match self {
            Preset::Gnuplot => "gnuplot",
            Preset::Tex2imMath => "tex2im-math",
            Preset::Tex2imTikz => "tex2im-tikz",
            Preset::Custom => "custom",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.key() == key)
    }

    /// Title of the preset's own tab.
    pub fn title(self) -> &'static str {
        match self {
            Preset::Gnuplot => "gnuplot",
            Preset::Tex2imMath => "math",
            Preset::Tex2imTikz => "tikz",
            Preset::Custom => "custom",
        }
    }

    /// Outer tab group. tex2im variants share one group.
    pub fn group(self) -> &'static str {
        match self {
            Preset::Gnuplot => "gnuplot",
            Preset::Tex2imMath | Preset::Tex2imTikz => "tex2im",
            Preset::Custom => "custom",
        }
    }

    pub fn default_command(self) -> &'static str {
        match self {
            Preset::Gnuplot => GNUPLOT_COMMAND,
            Preset::Tex2imMath => TEX2IM_MATH_COMMAND,
            Preset::Tex2imTikz => TEX2IM_TIKZ_COMMAND,
            Preset::Custom => CUSTOM_COMMAND,
        }
    }

    pub fn default_script(self) -> &'static str {
        match self {
            Preset::Gnuplot => GNUPLOT_SCRIPT,
            Preset::Tex2imMath => TEX2IM_MATH_SCRIPT,
            Preset::Tex2imTikz => TEX2IM_TIKZ_SCRIPT,
            Preset::Custom => CUSTOM_SCRIPT,
        }
    }

    /// File suffixes (without the dot) routed to this preset at startup.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Preset::Gnuplot => &["gp", "gnuplot"],
            Preset::Tex2imMath => &["tex"],
            Preset::Tex2imTikz | Preset::Custom => &[],
        }
    }

    pub fn claims(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions().contains(&ext))
    }

    /// The preset that claims `path`, if any.
    pub fn for_path(path: &Path) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.claims(path))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
