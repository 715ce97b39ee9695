// Builder for the kube client used by the access checks.

use anyhow::Result;
use simplelog::*;

use crate::configparser::config::ClusterConfig;

/// Returns a Kubernetes Client pointed at the configured cluster
pub async fn kube_client(cluster: &ClusterConfig) -> Result<kube::Client> {
    debug!("building kube client");

    // read in kubeconfig from given kubeconfig (or default)
    // (use kube::Config to specify context)
    let options = kube::config::KubeConfigOptions {
        context: Some(cluster.context()),
        cluster: None,
        user: None,
    };

    let client_config = match &cluster.kubeconfig {
        Some(kc_path) => {
            let kc = kube::config::Kubeconfig::read_from(kc_path)?;
            kube::Config::from_custom_kubeconfig(kc, &options).await?
        }
        None => kube::Config::from_kubeconfig(&options).await?,
    };

    // client::try_from returns a Result, but the Error is not compatible
    // with anyhow::Error, so assign this with ? and return Ok() separately
    let client = kube::Client::try_from(client_config)?;
    Ok(client)
}
