use anyhow::{Context, Result};
use fully_pub::fully_pub;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use simplelog::*;
use std::path::PathBuf;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;

use crate::cluster::Provider;
use crate::secrets::DuplicatePolicy;

pub fn parse() -> Result<HomesteadConfig> {
    debug!("trying to parse homestead.yaml");

    let env_overrides = Env::prefixed("HOMESTEAD_").split("_").map(|var| {
        // Using "_" as the split character works for almost all of our keys,
        // but some settings have underscores in their names. This handles
        // those few keys by undoing the s/_/./ that the figment::split() did.
        var.to_string()
            .to_lowercase()
            .replace("k8s.version", "k8s_version")
            .replace("cert.manager", "cert_manager")
            .replace("external.secrets", "external_secrets")
            .replace("duplicate.policy", "duplicate_policy")
            .replace("use.vault", "use_vault")
            .replace("values.file", "values_file")
            .replace("address.pool", "address_pool")
            .into()
    });
    trace!(
        "overriding config with envvar values: {}",
        env_overrides
            .iter()
            .map(|(key, val)| format!("{}='{}'", key.string, val))
            .join(", ")
    );

    let config = Figment::from(Yaml::file("homestead.yaml"))
        .merge(env_overrides)
        .extract()
        .with_context(|| "failed to parse homestead.yaml")?;

    trace!("got config: {config:#?}");

    Ok(config)
}

//
// ==== Structs for homestead.yaml parsing ====
//

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[fully_pub]
struct HomesteadConfig {
    cluster: ClusterConfig,
    #[serde(default)]
    vault: VaultConfig,
    #[serde(default)]
    addons: AddonsConfig,
    #[serde(default)]
    credentials: Vec<CredentialConfig>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[fully_pub]
struct ClusterConfig {
    provider: Provider,
    name: String,
    k8s_version: Option<String>,
    kubeconfig: Option<String>,
    kubecontext: Option<String>,
}

impl ClusterConfig {
    /// kubecontext to talk to this cluster; k3d and kind both prefix the
    /// cluster name with the tool's own.
    pub fn context(&self) -> String {
        if let Some(ctx) = &self.kubecontext {
            return ctx.clone();
        }
        match self.provider {
            Provider::K3s => format!("k3d-{}", self.name),
            Provider::Kind => format!("kind-{}", self.name),
            Provider::K0s => "default".to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
#[fully_pub]
struct VaultConfig {
    /// route generated credentials into Bitwarden instead of cluster secrets
    use_vault: bool,
    /// self-hosted server url, set with `bw config server`
    host: Option<String>,
    duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
#[fully_pub]
struct AddonsConfig {
    ingress: AddonConfig,
    cert_manager: AddonConfig,
    metallb: MetallbConfig,
    external_secrets: AddonConfig,
    argocd: ArgocdConfig,
}

/// Knobs shared by every chart-backed add-on.
#[derive(Debug, PartialEq, Serialize, Deserialize, Default, Clone)]
#[serde(default)]
#[fully_pub]
struct AddonConfig {
    enabled: bool,
    version: Option<String>,
    values_file: Option<PathBuf>,
    /// extra --set pairs, applied in the order written
    overrides: IndexMap<String, String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
#[fully_pub]
struct MetallbConfig {
    #[serde(flatten)]
    chart: AddonConfig,
    /// address range handed to the L2 pool, e.g. "192.168.1.240-192.168.1.250"
    address_pool: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
#[fully_pub]
struct ArgocdConfig {
    enabled: bool,
    /// hostname recorded on the generated admin credential
    hostname: Option<String>,
    apps: Vec<AppConfig>,
}

/// One Argo CD application to create after the install.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[fully_pub]
struct AppConfig {
    name: String,
    repo: String,
    path: String,
    namespace: String,
    #[serde(default = "default_dest_server")]
    dest_server: String,
}

fn default_dest_server() -> String {
    "https://kubernetes.default.svc".to_string()
}

/// One credential to generate and route.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[fully_pub]
struct CredentialConfig {
    name: String,
    namespace: String,
    hostname: Option<String>,
    /// overrides vault.use_vault for this credential only
    use_vault: Option<bool>,
    /// empty values are filled with a generated password
    fields: IndexMap<String, String>,
}
