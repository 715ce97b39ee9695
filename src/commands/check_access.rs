use anyhow::{Context, Result};
use simplelog::*;
use std::process::exit;

use crate::access_handlers as access;
use crate::configparser::get_config;
use crate::runner::ShellRunner;

pub fn run(kubernetes: &bool, vault: &bool) {
    // if user did not give a specific check, check all of them
    let check_all = !kubernetes && !vault;

    let config = match get_config() {
        Ok(c) => c,
        Err(err) => {
            error!("{err:?}");
            exit(1);
        }
    };

    let result: Result<()> = (|| {
        if *kubernetes || check_all {
            info!("checking kubernetes access...");
            access::kube::check(&config.cluster).context("kubernetes access check failed")?;
        }
        if *vault || check_all {
            info!("checking vault access...");
            access::vault::check(&ShellRunner).context("vault access check failed")?;
        }
        Ok(())
    })();

    // die if there were any errors
    match result {
        Ok(_) => info!("  all good!"),
        Err(err) => {
            error!("{err:#}");
            exit(1)
        }
    }
}
