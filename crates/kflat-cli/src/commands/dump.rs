use std::path::PathBuf;

use kflat_image::{Colors, Image, dump};

pub struct DumpArgs {
    pub image_path: PathBuf,
    pub colors: Colors,
}

pub fn run(args: DumpArgs) {
    let image = match Image::from_path(&args.image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("error: {}: {}", args.image_path.display(), e);
            std::process::exit(1);
        }
    };

    print!("{}", dump(&image, args.colors));
}
