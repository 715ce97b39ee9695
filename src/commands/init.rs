use std::path::Path;
use std::process::exit;
use std::fs;

use simplelog::*;

const EXAMPLE_CONFIG: &str = include_str!("homestead.example.yaml");

pub fn run(force: &bool) {
    let target = Path::new("homestead.yaml");

    if target.exists() && !force {
        error!("homestead.yaml already exists (use --force to overwrite)");
        exit(1);
    }

    if let Err(err) = fs::write(target, EXAMPLE_CONFIG) {
        error!("could not write homestead.yaml: {err:?}");
        exit(1);
    }

    info!("wrote starter homestead.yaml, edit it and run `homestead up`");
}
