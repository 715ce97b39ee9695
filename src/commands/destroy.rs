use std::process::exit;

use simplelog::*;

use crate::cluster::Cluster;
use crate::configparser::get_config;
use crate::runner::ShellRunner;

pub fn run(yes: &bool) {
    let config = match get_config() {
        Ok(c) => c,
        Err(err) => {
            error!("{err:?}");
            exit(1);
        }
    };

    if !yes {
        let confirmed = inquire::Confirm::new(&format!(
            "Really delete cluster {:?} and everything on it?",
            config.cluster.name
        ))
        .with_default(false)
        .prompt()
        .unwrap_or(false);

        if !confirmed {
            info!("not touching anything");
            return;
        }
    }

    let runner = ShellRunner;
    if let Err(err) = Cluster::new(&runner, &config.cluster).delete() {
        error!("{err:?}");
        exit(1);
    }

    info!("cluster deleted")
}
