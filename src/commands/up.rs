use std::process::exit;

use anyhow::{Context, Result};
use simplelog::*;

use crate::addons;
use crate::cluster::Cluster;
use crate::configparser::config::CredentialConfig;
use crate::configparser::{get_config, HomesteadConfig};
use crate::runner::{Runner, ShellRunner};
use crate::secrets::vault::{Vault, VaultEnv};
use crate::secrets::{password, Credential, InteractivePrompt, SecretRouter};

pub fn run(no_cluster: &bool) {
    let config = match get_config() {
        Ok(c) => c,
        Err(err) => {
            error!("{err:?}");
            exit(1);
        }
    };

    let runner = ShellRunner;

    if let Err(err) = bootstrap(&runner, config, no_cluster) {
        error!("{err:?}");
        exit(1);
    }

    info!("homelab is up!");
}

fn bootstrap(runner: &dyn Runner, config: HomesteadConfig, no_cluster: &bool) -> Result<()> {
    // cluster first, everything else lands on it
    if *no_cluster {
        warn!("--no-cluster given, assuming the cluster is already up");
    } else {
        let cluster = Cluster::new(runner, &config.cluster);
        if cluster.exists()? {
            info!("cluster {} already exists, reusing it", config.cluster.name);
        } else {
            cluster.create().context("could not create cluster")?;
        }
    }

    // only open a vault session when something will route into it
    let wants_vault = config.vault.use_vault
        || config
            .credentials
            .iter()
            .any(|cred| cred.use_vault.unwrap_or(false));
    let mut vault = match wants_vault {
        true => Some(Vault::open(runner, &VaultEnv::load()).context("could not unlock vault")?),
        false => None,
    };

    // the vault gets locked again on every exit path below (when we own the
    // session), even after a failure
    let result = deploy(runner, config, vault.as_ref());

    if let Some(vault) = vault.as_mut() {
        if let Err(err) = vault.lock() {
            warn!("could not lock vault: {err:#}");
        }
    }

    result
}

fn deploy(runner: &dyn Runner, config: HomesteadConfig, vault: Option<&Vault>) -> Result<()> {
    let prompt = InteractivePrompt;
    let mut router = SecretRouter::new(
        runner,
        vault,
        config.vault.duplicate_policy,
        &prompt,
    );

    addons::deploy_addons(runner, config, &mut router)
        .context("could not deploy add-ons")?;

    for cred in &config.credentials {
        info!("routing credential {}...", cred.name);
        router
            .route(&realize_credential(cred, config))
            .with_context(|| format!("could not route credential {}", cred.name))?;
    }

    Ok(())
}

/// Fill in a configured credential: empty field values get a generated
/// password, and the vault routing default comes from the vault section.
fn realize_credential(cred: &CredentialConfig, config: HomesteadConfig) -> Credential {
    let fields = cred
        .fields
        .iter()
        .map(|(name, value)| {
            let value = match value.is_empty() {
                true => password::generate_default(),
                false => value.clone(),
            };
            (name.clone(), value)
        })
        .collect();

    Credential {
        name: cred.name.clone(),
        namespace: cred.namespace.clone(),
        fields,
        hostname: cred.hostname.clone(),
        use_vault: cred.use_vault.unwrap_or(config.vault.use_vault),
    }
}
