//! Command builders for the CLI.

use clap::Command;

use super::args::*;

/// Build the complete CLI with all subcommands.
pub fn build_cli() -> Command {
    Command::new("kflat")
        .about("Flatten live memory graphs into relocatable images")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(targets_command())
        .subcommand(run_command())
        .subcommand(dump_command())
        .subcommand(check_command())
}

/// List built-in capture targets.
pub fn targets_command() -> Command {
    Command::new("targets").about("List built-in capture targets")
}

/// Capture a built-in target and verify the result.
pub fn run_command() -> Command {
    Command::new("run")
        .about("Capture a target and verify the image")
        .override_usage(
            "\
  kflat run <TARGET>
  kflat run <TARGET> -o <FILE> [--max-size <BYTES>] [--config <FILE>]",
        )
        .after_help(
            r#"EXAMPLES:
  kflat run SIMPLE                     # capture, verify, print a summary
  kflat run STRINGSET -o set.kflat     # keep the image
  kflat run LIST --max-size 4096       # fail if the image outgrows 4 KiB
  kflat run RBNODE --debug             # log the run"#,
        )
        .arg(target_arg())
        .arg(output_file_arg())
        .arg(max_size_arg())
        .arg(config_arg())
        .arg(debug_arg())
}

/// Show an image's sections.
pub fn dump_command() -> Command {
    Command::new("dump")
        .about("Show an image's header, roots, nodes and fixups")
        .arg(image_path_arg())
        .arg(color_arg())
}

/// Validate an image file.
pub fn check_command() -> Command {
    Command::new("check")
        .about("Validate an image file")
        .after_help(
            r#"Checks the header, the checksum, and that every fixup slot and
target lies inside the data section. Silent on success."#,
        )
        .arg(image_path_arg())
}
