use std::fs;
use std::path::{Path, PathBuf};

use kflat_engine::{EnableRequest, FlattenConfig, Session};
use kflat_image::Image;

use crate::targets::builtin;

pub struct RunArgs {
    pub target: String,
    pub output: Option<PathBuf>,
    pub max_size: Option<u64>,
    pub config: Option<PathBuf>,
    pub debug: bool,
}

pub fn run(args: RunArgs) {
    let bytes = match capture(&args) {
        Ok(bytes) => bytes,
        Err(msg) => {
            eprintln!("error: {}", msg);
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.output
        && let Err(e) = fs::write(path, &bytes)
    {
        eprintln!("error: failed to write '{}': {}", path.display(), e);
        std::process::exit(1);
    }

    match Image::from_bytes(&bytes) {
        Ok(image) => println!("{}", summary(&args.target, &image)),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Capture `args.target` through a session and verify the image.
pub fn capture(args: &RunArgs) -> Result<Vec<u8>, String> {
    let config = load_config(args.config.as_deref(), args.max_size)?;
    let targets = builtin().map_err(|e| format!("cannot lay out targets: {e}"))?;
    let Some(fixture) = targets.iter().find(|t| t.name() == args.target).cloned() else {
        return Err(format!(
            "unknown target '{}'; run 'kflat targets' for the list",
            args.target
        ));
    };

    let mut session = Session::new(config);
    for target in targets {
        session.register(Box::new(target));
    }

    let pid = std::process::id();
    let request = EnableRequest {
        pid: Some(pid),
        debug: args.debug,
        ..EnableRequest::new(&args.target)
    };
    session.begin(request).map_err(|e| e.to_string())?;
    session.invoke(pid).map_err(|e| e.to_string())?;
    let report = session.end().map_err(|e| e.to_string())?;
    if let Some(e) = report.error {
        return Err(format!("capture of '{}' failed: {e}", args.target));
    }
    let bytes = session
        .take_image()
        .ok_or_else(|| format!("capture of '{}' produced no image", args.target))?;

    let image = Image::from_bytes(&bytes).map_err(|e| e.to_string())?;
    image.check().map_err(|e| e.to_string())?;
    log::debug!(
        "captured '{}' in {} invocation(s), {} bytes",
        args.target,
        report.invoked,
        report.size
    );
    fixture
        .verify(&image)
        .map_err(|e| format!("verification of '{}' failed: {e}", args.target))?;
    Ok(bytes)
}

/// Configuration from a JSON file, with the size limit overridden if given.
pub fn load_config(path: Option<&Path>, max_size: Option<u64>) -> Result<FlattenConfig, String> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;
            serde_json::from_str::<FlattenConfig>(&text)
                .map_err(|e| format!("invalid config '{}': {}", path.display(), e))?
        }
        None => FlattenConfig::default(),
    };
    if let Some(limit) = max_size {
        config = config.max_size(limit);
    }
    log::debug!("flatten config: {config:?}");
    Ok(config)
}

/// One line describing a verified image.
pub fn summary(target: &str, image: &Image) -> String {
    format!(
        "{target}: {} bytes, {} nodes, {} fixups, {} roots",
        image.header().total_size,
        image.nodes().len(),
        image.fixups().len(),
        image.roots().len()
    )
}
