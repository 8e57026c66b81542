use kflat_engine::CaptureTarget;

use crate::targets::builtin;

pub fn run() {
    let targets = match builtin() {
        Ok(targets) => targets,
        Err(e) => {
            eprintln!("error: cannot lay out targets: {}", e);
            std::process::exit(1);
        }
    };
    let width = targets.iter().map(|t| t.name().len()).max().unwrap_or(0);
    for target in &targets {
        println!("{:width$}  {}", target.name(), target.description());
    }
}
