// Cluster add-ons installed ahead of any workloads: the ingress controller,
// cert-manager, metallb, external-secrets, and Argo CD with its managed
// applications. Each installer is idempotent via the release check in
// Applier::install, so running `up` twice is safe.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use simplelog::*;

use crate::applier::{Applier, ChartInstall, ManifestResource, ReadinessCheck};
use crate::configparser::config::{AddonConfig, ArgocdConfig, HomesteadConfig, MetallbConfig};
use crate::runner::{Cmd, Runner};
use crate::secrets::{password, Credential, SecretRouter};

const ARGOCD_MANIFEST: &str =
    "https://raw.githubusercontent.com/argoproj/argo-cd/stable/manifests/install.yaml";

/// Install every enabled add-on, in dependency order.
pub fn deploy_addons(
    runner: &dyn Runner,
    config: &HomesteadConfig,
    router: &mut SecretRouter,
) -> Result<()> {
    let applier = Applier::new(runner);
    let addons = &config.addons;

    if addons.ingress.enabled {
        install_ingress(&applier, &addons.ingress)?;
    }
    if addons.cert_manager.enabled {
        install_certmanager(&applier, &addons.cert_manager)?;
    }
    if addons.metallb.chart.enabled {
        install_metallb(&applier, &addons.metallb)?;
    }
    if addons.external_secrets.enabled {
        install_external_secrets(
            &applier,
            router,
            &addons.external_secrets,
            config.vault.use_vault,
        )?;
    }
    if addons.argocd.enabled {
        install_argocd(&applier, router, &addons.argocd, config.vault.use_vault)?;
    }

    info!("add-ons deployed!");
    Ok(())
}

pub fn install_ingress(applier: &Applier, cfg: &AddonConfig) -> Result<()> {
    info!("installing ingress-nginx...");
    applier.helm_repo("ingress-nginx", "https://kubernetes.github.io/ingress-nginx")?;

    applier.install(&ChartInstall {
        release_name: "nginx-ingress".to_string(),
        chart: "ingress-nginx/ingress-nginx".to_string(),
        version: cfg.version.clone(),
        namespace: "ingress".to_string(),
        values_file: cfg.values_file.clone(),
        overrides: cfg.overrides.clone(),
        wait: true,
        timeout: None,
    })?;

    Ok(())
}

pub fn install_certmanager(applier: &Applier, cfg: &AddonConfig) -> Result<()> {
    info!("installing cert-manager...");
    applier.helm_repo("jetstack", "https://charts.jetstack.io")?;

    let mut overrides = cfg.overrides.clone();
    overrides
        .entry("installCRDs".to_string())
        .or_insert("true".to_string());

    applier.install(&ChartInstall {
        release_name: "cert-manager".to_string(),
        chart: "jetstack/cert-manager".to_string(),
        version: cfg.version.clone(),
        namespace: "cert-manager".to_string(),
        values_file: cfg.values_file.clone(),
        overrides,
        wait: true,
        timeout: None,
    })?;

    Ok(())
}

/// metallb chart, then an L2 address pool once the controller is up. The
/// pool resources are CRs served by metallb's own webhook, which can lag
/// behind the chart's --wait, so the apply gets a bounded retry.
pub fn install_metallb(applier: &Applier, cfg: &MetallbConfig) -> Result<()> {
    info!("installing metallb...");
    applier.helm_repo("metallb", "https://metallb.github.io/metallb")?;

    applier.install(&ChartInstall {
        release_name: "metallb".to_string(),
        chart: "metallb/metallb".to_string(),
        version: cfg.chart.version.clone(),
        namespace: "metallb-system".to_string(),
        values_file: cfg.chart.values_file.clone(),
        overrides: cfg.chart.overrides.clone(),
        wait: true,
        timeout: None,
    })?;

    let Some(pool) = &cfg.address_pool else {
        warn!("metallb installed without an address pool; set addons.metallb.address_pool");
        return Ok(());
    };

    let resources = [
        ManifestResource::new("metallb.io/v1beta1", "IPAddressPool", "homestead-pool")
            .namespace("metallb-system")
            .with(
                "spec",
                serde_yml::to_value(serde_json::json!({ "addresses": [pool] }))?,
            ),
        ManifestResource::new("metallb.io/v1beta1", "L2Advertisement", "homestead-l2")
            .namespace("metallb-system")
            .with(
                "spec",
                serde_yml::to_value(serde_json::json!({ "ipAddressPools": ["homestead-pool"] }))?,
            ),
    ];
    let ready = ReadinessCheck::new(
        "metallb-system",
        "app.kubernetes.io/name=metallb",
        Duration::from_secs(120),
    );

    with_retries(5, Duration::from_secs(10), || {
        applier.apply(&resources, Some(&ready))
    })
}

/// external-secrets chart, plus a generated access token for secret stores
/// to authenticate with, routed wherever other credentials go.
pub fn install_external_secrets(
    applier: &Applier,
    router: &mut SecretRouter,
    cfg: &AddonConfig,
    use_vault: bool,
) -> Result<()> {
    info!("installing external-secrets...");
    applier.helm_repo("external-secrets", "https://charts.external-secrets.io")?;

    let mut overrides = cfg.overrides.clone();
    overrides
        .entry("installCRDs".to_string())
        .or_insert("true".to_string());

    applier.install(&ChartInstall {
        release_name: "external-secrets".to_string(),
        chart: "external-secrets/external-secrets".to_string(),
        version: cfg.version.clone(),
        namespace: "external-secrets".to_string(),
        values_file: cfg.values_file.clone(),
        overrides,
        wait: true,
        timeout: None,
    })?;

    let mut fields = IndexMap::new();
    fields.insert("token".to_string(), password::generate_default());
    router.route(&Credential {
        name: "external-secrets-token".to_string(),
        namespace: "external-secrets".to_string(),
        fields,
        hostname: None,
        use_vault,
    })?;

    Ok(())
}

/// Argo CD from the upstream install manifest, a routed admin credential,
/// and one `argocd app create` per configured application.
pub fn install_argocd(
    applier: &Applier,
    router: &mut SecretRouter,
    cfg: &ArgocdConfig,
    use_vault: bool,
) -> Result<()> {
    info!("installing argo cd...");

    applier.runner.run(&[
        Cmd::new("kubectl create namespace argocd").tolerate_errors()
    ])?;
    applier.apply_remote(
        ARGOCD_MANIFEST,
        "argocd",
        "argocd-server",
        &ReadinessCheck::new(
            "argocd",
            "app.kubernetes.io/name=argocd-server",
            Duration::from_secs(300),
        ),
    )?;

    // generated admin credential, routed wherever other credentials go
    let mut fields = IndexMap::new();
    fields.insert("username".to_string(), "admin".to_string());
    fields.insert("password".to_string(), password::generate_default());
    router.route(&Credential {
        name: "argocd-admin".to_string(),
        namespace: "argocd".to_string(),
        fields,
        hostname: cfg.hostname.clone(),
        use_vault,
    })?;

    for app in &cfg.apps {
        info!("creating argo cd application {}...", app.name);
        applier.runner.run(&[Cmd::new(format!(
            "argocd app create {} --repo {} --path {} --dest-namespace {} --dest-server {} --upsert",
            app.name, app.repo, app.path, app.namespace, app.dest_server
        ))])?;
    }

    Ok(())
}

/// Retry a fallible step a fixed number of times with a fixed pause.
/// Bounded on purpose; a step that never succeeds must surface, not spin.
fn with_retries<T>(
    attempts: u32,
    pause: Duration,
    mut step: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut last_err = None;

    for attempt in 1..=attempts {
        match step() {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("attempt {attempt}/{attempts} failed: {e:#}");
                last_err = Some(e);
                if attempt < attempts {
                    thread::sleep(pause);
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("retry budget was zero")))
}
