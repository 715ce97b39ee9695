use std::process::exit;

use simplelog::*;

use crate::configparser::get_config;

pub fn run() {
    info!("validating config...");

    // attempt to parse config but don't do anything with the result
    if let Err(err) = get_config() {
        error!("{err:?}");
        exit(1);
    }

    info!("config is ok!")
}
