//! Dispatch logic: extract params from ArgMatches and convert to command args.

use std::path::PathBuf;

use clap::ArgMatches;

use super::ColorChoice;
use crate::commands::check::CheckArgs;
use crate::commands::dump::DumpArgs;
use crate::commands::run::RunArgs;

pub struct TargetsParams;

impl TargetsParams {
    pub fn from_matches(_m: &ArgMatches) -> Self {
        Self
    }
}

pub struct RunParams {
    pub target: String,
    pub output: Option<PathBuf>,
    pub max_size: Option<u64>,
    pub config: Option<PathBuf>,
    pub debug: bool,
}

impl RunParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            target: m.get_one::<String>("target").cloned().unwrap_or_default(),
            output: m.get_one::<PathBuf>("output").cloned(),
            max_size: m.get_one::<u64>("max_size").copied(),
            config: m.get_one::<PathBuf>("config").cloned(),
            debug: m.get_flag("debug"),
        }
    }
}

impl From<RunParams> for RunArgs {
    fn from(p: RunParams) -> Self {
        Self {
            target: p.target,
            output: p.output,
            max_size: p.max_size,
            config: p.config,
            debug: p.debug,
        }
    }
}

pub struct DumpParams {
    pub image_path: PathBuf,
    pub color: ColorChoice,
}

impl DumpParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            image_path: image_path(m),
            color: ColorChoice::from_flag(m.get_one::<String>("color").map(String::as_str)),
        }
    }
}

impl From<DumpParams> for DumpArgs {
    fn from(p: DumpParams) -> Self {
        Self {
            image_path: p.image_path,
            colors: p.color.colors(),
        }
    }
}

pub struct CheckParams {
    pub image_path: PathBuf,
}

impl CheckParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            image_path: image_path(m),
        }
    }
}

impl From<CheckParams> for CheckArgs {
    fn from(p: CheckParams) -> Self {
        Self {
            image_path: p.image_path,
        }
    }
}

// Required by the command definition.
fn image_path(m: &ArgMatches) -> PathBuf {
    m.get_one::<PathBuf>("image_path")
        .cloned()
        .unwrap_or_default()
}
