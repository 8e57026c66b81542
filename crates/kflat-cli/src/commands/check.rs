use std::path::{Path, PathBuf};

use kflat_image::{Image, ImageError};

pub struct CheckArgs {
    pub image_path: PathBuf,
}

pub fn run(args: CheckArgs) {
    if let Err(e) = check(&args.image_path) {
        eprintln!("error: {}: {}", args.image_path.display(), e);
        std::process::exit(1);
    }

    // Silent on success (like cargo check)
}

/// Load the image (header, size and checksum) and check its fixups.
pub fn check(path: &Path) -> Result<(), ImageError> {
    Image::from_path(path)?.check()
}
