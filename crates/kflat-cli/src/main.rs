mod cli;
mod commands;
mod targets;

use cli::{CheckParams, DumpParams, RunParams, TargetsParams, build_cli};

fn main() {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("targets", m)) => {
            let _params = TargetsParams::from_matches(m);
            init_logging(false);
            commands::targets::run();
        }
        Some(("run", m)) => {
            let params = RunParams::from_matches(m);
            init_logging(params.debug);
            commands::run::run(params.into());
        }
        Some(("dump", m)) => {
            let params = DumpParams::from_matches(m);
            init_logging(false);
            commands::dump::run(params.into());
        }
        Some(("check", m)) => {
            let params = CheckParams::from_matches(m);
            init_logging(false);
            commands::check::run(params.into());
        }
        _ => unreachable!("clap should have caught this"),
    }
}

/// `RUST_LOG` wins; otherwise warnings, or debug output with `--debug`.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}
