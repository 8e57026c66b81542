mod args;
mod commands;
mod dispatch;


use std::io::IsTerminal;

use kflat_image::Colors;

pub use commands::build_cli;
pub use dispatch::{CheckParams, DumpParams, RunParams, TargetsParams};

/// `--color` setting for image dumps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Parse a `--color` value; anything unrecognised falls back to `auto`.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value {
            Some("always") => Self::Always,
            Some("never") => Self::Never,
            _ => Self::Auto,
        }
    }

    /// Whether to colour, given if stdout is a terminal.
    pub fn enabled(self, tty: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => tty,
        }
    }

    /// The dump palette for the current stdout.
    pub fn colors(self) -> Colors {
        Colors::new(self.enabled(std::io::stdout().is_terminal()))
    }
}
