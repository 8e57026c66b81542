//! Shared argument builders for CLI commands.
//!
//! Each function returns a `clap::Arg` that can be composed into commands.

use std::path::PathBuf;

use clap::{Arg, ArgAction, value_parser};

/// Built-in capture target (positional).
pub fn target_arg() -> Arg {
    Arg::new("target")
        .value_name("TARGET")
        .required(true)
        .help("Capture target (see `kflat targets`)")
}

/// Image file (positional).
pub fn image_path_arg() -> Arg {
    Arg::new("image_path")
        .value_name("IMAGE")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Image file")
}

/// Write output to file (-o/--output).
pub fn output_file_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Write the image to file")
}

/// Image size limit (--max-size).
pub fn max_size_arg() -> Arg {
    Arg::new("max_size")
        .long("max-size")
        .value_name("BYTES")
        .value_parser(value_parser!(u64))
        .help("Abort the capture once the image would exceed this size")
}

/// Flattening configuration file (--config).
pub fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("JSON flattening configuration")
}

/// Debug logging (--debug).
pub fn debug_arg() -> Arg {
    Arg::new("debug")
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Log capture progress (overridden by RUST_LOG)")
}

/// Color output control (--color).
pub fn color_arg() -> Arg {
    Arg::new("color")
        .long("color")
        .value_name("WHEN")
        .default_value("auto")
        .value_parser(["auto", "always", "never"])
        .help("Colorize output")
}
