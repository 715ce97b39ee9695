use anyhow::{anyhow, Result};
use k8s_openapi::api::authentication::v1::SelfSubjectReview;
use k8s_openapi::serde_json::{from_value, json};
use simplelog::*;

use crate::clients::kube_client;
use crate::configparser::config::ClusterConfig;

/// kubernetes access checks
#[tokio::main(flavor = "current_thread")] // make this a sync function
pub async fn check(cluster: &ClusterConfig) -> Result<()> {
    // we need to make sure that:
    // a) can talk to the cluster
    // b) are authenticated as somebody

    // build a client
    let client = kube_client(cluster).await?;

    // try to get cluster info (whoami)
    let reviewapi: kube::Api<SelfSubjectReview> = kube::Api::all(client);
    let resp = reviewapi
        .create(
            &kube::api::PostParams::default(),
            &from_value(json!({
                "apiVersion": "authentication.k8s.io/v1",
                "kind": "SelfSubjectReview"
            }))?,
        )
        .await?;
    let status = resp.status.ok_or(anyhow!("Could not access cluster"))?;

    debug!(
        "authenticated as {:?}",
        status
            .user_info
            .and_then(|info| info.username)
            .unwrap_or("(no username)".into())
    );

    Ok(())
}
