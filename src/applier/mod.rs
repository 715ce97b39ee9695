// Declarative installs: helm releases and kubectl-applied manifests, with
// bounded readiness polling. All cluster mutations funnel through here so
// they share one Runner code path.

use std::collections::HashMap as Map;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use std::{fmt, fs, thread};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use simplelog::*;

use crate::runner::{Cmd, Runner};

/// Everything a chart install needs, spelled out. No field here is assembled
/// dynamically; forgetting one is a compile error, not a runtime surprise.
#[derive(Debug, Clone, Default)]
pub struct ChartInstall {
    pub release_name: String,
    pub chart: String,
    pub version: Option<String>,
    pub namespace: String,
    pub values_file: Option<PathBuf>,
    /// --set pairs, applied in map order. IndexMap keeps that order stable.
    pub overrides: IndexMap<String, String>,
    pub wait: bool,
    /// bounds helm's own --wait instead of trusting its internal default
    pub timeout: Option<Duration>,
}

impl ChartInstall {
    /// The exact `helm upgrade --install` line for this release. Flag order
    /// is a contract: version, values, set-pairs, wait, timeout.
    pub fn invocation(&self) -> String {
        let mut cmd = format!(
            "helm upgrade {} {} --install -n {} --create-namespace",
            self.release_name, self.chart, self.namespace
        );

        if let Some(version) = &self.version {
            cmd.push_str(&format!(" --version {version}"));
        }
        if let Some(values) = &self.values_file {
            cmd.push_str(&format!(" --values {}", values.display()));
        }
        for (key, val) in &self.overrides {
            cmd.push_str(&format!(" --set {key}={val}"));
        }
        if self.wait {
            cmd.push_str(" --wait --wait-for-jobs");
        }
        if let Some(timeout) = self.timeout {
            cmd.push_str(&format!(" --timeout {}s", timeout.as_secs()));
        }

        cmd
    }
}

/// An inline Kubernetes object to be staged to a file and applied.
#[derive(Debug, Clone)]
pub struct ManifestResource {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub labels: Map<String, String>,
    /// top-level fields beyond metadata (spec, stringData, type, ...)
    pub body: IndexMap<String, serde_yml::Value>,
}

impl ManifestResource {
    pub fn new(api_version: &str, kind: &str, name: &str) -> Self {
        ManifestResource {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            // unset namespace means "default", always
            namespace: "default".to_string(),
            labels: Map::new(),
            body: IndexMap::new(),
        }
    }

    pub fn namespace(mut self, ns: &str) -> Self {
        self.namespace = ns.to_string();
        self
    }

    pub fn label(mut self, key: &str, val: &str) -> Self {
        self.labels.insert(key.to_string(), val.to_string());
        self
    }

    pub fn with(mut self, key: &str, value: serde_yml::Value) -> Self {
        self.body.insert(key.to_string(), value);
        self
    }

    pub fn to_yaml(&self) -> Result<String> {
        let mut meta = serde_yml::Mapping::new();
        meta.insert("name".into(), self.name.clone().into());
        meta.insert("namespace".into(), self.namespace.clone().into());
        if !self.labels.is_empty() {
            meta.insert("labels".into(), serde_yml::to_value(&self.labels)?);
        }

        let mut doc = serde_yml::Mapping::new();
        doc.insert("apiVersion".into(), self.api_version.clone().into());
        doc.insert("kind".into(), self.kind.clone().into());
        doc.insert("metadata".into(), serde_yml::Value::Mapping(meta));
        for (key, val) in &self.body {
            doc.insert(key.clone().into(), val.clone());
        }

        serde_yml::to_string(&serde_yml::Value::Mapping(doc))
            .with_context(|| format!("could not serialize {} {}", self.kind, self.name))
    }
}

/// Poll-until-present check for pods behind a label selector.
#[derive(Debug, Clone)]
pub struct ReadinessCheck {
    pub namespace: String,
    pub selector: String,
    pub timeout: Duration,
    pub interval: Duration,
}

impl ReadinessCheck {
    pub fn new(namespace: &str, selector: &str, timeout: Duration) -> Self {
        ReadinessCheck {
            namespace: namespace.to_string(),
            selector: selector.to_string(),
            timeout,
            interval: Duration::from_secs(5),
        }
    }
}

/// Readiness never arrived within budget. Kept as its own type so callers
/// can tell "the tool failed" apart from "the tool worked but nothing came up".
#[derive(Debug)]
pub struct ReadinessTimeout {
    pub namespace: String,
    pub selector: String,
    pub waited: Duration,
}

impl fmt::Display for ReadinessTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no running pods matching '{}' in namespace {} after {}s",
            self.selector,
            self.namespace,
            self.waited.as_secs()
        )
    }
}

impl std::error::Error for ReadinessTimeout {}

pub struct Applier<'a> {
    pub runner: &'a dyn Runner,
}

impl Applier<'_> {
    pub fn new(runner: &dyn Runner) -> Applier<'_> {
        Applier { runner }
    }

    /// Register a chart repo. --force-update makes re-adding a no-op.
    pub fn helm_repo(&self, name: &str, url: &str) -> Result<()> {
        self.runner.run(&[
            Cmd::new(format!("helm repo add {name} {url} --force-update")),
            Cmd::new(format!("helm repo update {name}")),
        ])?;
        Ok(())
    }

    /// Is a release with this name already present in the namespace?
    pub fn installed(&self, release_name: &str, namespace: &str) -> Result<bool> {
        let out = self.runner.run(&[Cmd::new(format!(
            "helm list --filter '^{release_name}$' -n {namespace} -o json"
        ))])?;

        let listed: serde_json::Value =
            serde_json::from_str(if out.is_empty() { "[]" } else { out.as_str() })
                .context("could not parse helm list output")?;

        Ok(listed.as_array().is_some_and(|releases| !releases.is_empty()))
    }

    /// Install a chart, or do nothing if the release already exists.
    /// Returns whether an install was actually performed, so re-running the
    /// whole bootstrap is safe.
    pub fn install(&self, chart: &ChartInstall) -> Result<bool> {
        if self.installed(&chart.release_name, &chart.namespace)? {
            info!(
                "release {} already installed in {}, skipping",
                chart.release_name, chart.namespace
            );
            return Ok(false);
        }

        self.runner
            .run(&[Cmd::new(chart.invocation())])
            .with_context(|| format!("could not install chart {}", chart.chart))?;

        Ok(true)
    }

    /// Apply manifests one by one via a staging temp file each, then
    /// optionally wait for a readiness check to pass.
    ///
    /// Staged files can hold secret material in stringData, so they must be
    /// gone from disk by the time this returns, ok or not. `NamedTempFile`
    /// unlinks on drop, and we drop before propagating any error.
    pub fn apply(&self, resources: &[ManifestResource], ready: Option<&ReadinessCheck>) -> Result<()> {
        for resource in resources {
            // file name carries kind + name so multi-kind batches don't collide
            let staged = tempfile::Builder::new()
                .prefix(&format!("{}-{}-", resource.kind.to_lowercase(), resource.name))
                .suffix(".yaml")
                .tempfile()?;
            let path = staged.path().to_path_buf();

            let applied = resource.to_yaml().and_then(|yaml| {
                fs::write(&path, yaml)?;
                self.runner.run(&[Cmd::new(format!(
                    "kubectl apply -f {} -n {}",
                    path.display(),
                    resource.namespace
                ))])
            });

            drop(staged);
            applied.with_context(|| {
                format!(
                    "could not apply {} {}/{}",
                    resource.kind, resource.namespace, resource.name
                )
            })?;
        }

        if let Some(check) = ready {
            self.wait_ready(check)?;
        }
        Ok(())
    }

    /// Apply a manifest the cluster fetches by URL, then require both
    /// readiness signals: the named deployment's rollout, and running pods
    /// behind the selector.
    pub fn apply_remote(
        &self,
        url: &str,
        namespace: &str,
        deployment: &str,
        ready: &ReadinessCheck,
    ) -> Result<()> {
        self.runner.run(&[
            Cmd::new(format!("kubectl apply -f {url} -n {namespace}")),
            Cmd::new(format!(
                "kubectl rollout status deployment/{deployment} -n {namespace} --timeout={}s",
                ready.timeout.as_secs()
            )),
        ])?;

        // rollout status only covers the one deployment; the manifest may
        // start other pods the caller cares about
        self.wait_ready(ready)
    }

    /// Poll for running pods behind a selector at a fixed interval until the
    /// timeout. An absent namespace or zero matching pods is "not yet", not
    /// an error; only the clock runs out on us.
    pub fn wait_ready(&self, check: &ReadinessCheck) -> Result<()> {
        debug!(
            "waiting for pods matching '{}' in {}",
            check.selector, check.namespace
        );
        let started = Instant::now();

        loop {
            let probe = Cmd::new(format!(
                "kubectl get pods -n {} -l {} --field-selector=status.phase=Running --no-headers",
                check.namespace, check.selector
            ))
            .tolerate_errors()
            .quiet();

            let out = self.runner.run_one(&probe)?;
            if !out.failed() && out.stdout.lines().any(|line| !line.trim().is_empty()) {
                debug!("pods matching '{}' are up", check.selector);
                return Ok(());
            }

            if started.elapsed() >= check.timeout {
                return Err(anyhow::Error::new(ReadinessTimeout {
                    namespace: check.namespace.clone(),
                    selector: check.selector.clone(),
                    waited: check.timeout,
                }));
            }

            thread::sleep(check.interval);
        }
    }
}
