// Local cluster provisioning. One CLI tool per provider: k3d for k3s
// clusters, kind, and k0s for a bare single-node install.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use simplelog::*;

use crate::configparser::config::ClusterConfig;
use crate::runner::{Cmd, Runner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    K3s,
    Kind,
    K0s,
}

pub struct Cluster<'a> {
    runner: &'a dyn Runner,
    config: &'a ClusterConfig,
}

impl<'a> Cluster<'a> {
    pub fn new(runner: &'a dyn Runner, config: &'a ClusterConfig) -> Self {
        Cluster { runner, config }
    }

    /// Does a cluster with the configured name already exist?
    pub fn exists(&self) -> Result<bool> {
        let name = &self.config.name;
        match self.config.provider {
            Provider::K3s => {
                let out = self
                    .runner
                    .run(&[Cmd::new("k3d cluster list -o json").quiet()])?;
                let clusters: serde_json::Value =
                    serde_json::from_str(if out.is_empty() { "[]" } else { out.as_str() })
                        .context("could not parse k3d cluster list output")?;
                Ok(clusters
                    .as_array()
                    .is_some_and(|list| list.iter().any(|c| c["name"] == name.as_str())))
            }
            Provider::Kind => {
                let out = self.runner.run(&[Cmd::new("kind get clusters").quiet()])?;
                Ok(out.lines().any(|line| line.trim() == name))
            }
            // k0s is installed on the host itself; status exits non-zero
            // when no controller is set up
            Provider::K0s => {
                let status = self
                    .runner
                    .run_one(&Cmd::new("k0s status").quiet().tolerate_errors())?;
                Ok(!status.failed())
            }
        }
    }

    pub fn create(&self) -> Result<()> {
        let name = &self.config.name;
        info!("creating {:?} cluster {name}...", self.config.provider);

        match self.config.provider {
            Provider::K3s => {
                let mut line = format!("k3d cluster create {name} --wait");
                if let Some(version) = &self.config.k8s_version {
                    line.push_str(&format!(" --image rancher/k3s:{version}"));
                }
                self.runner.run(&[Cmd::new(line)])?;
            }
            Provider::Kind => {
                let mut line = format!("kind create cluster --name {name}");
                if let Some(version) = &self.config.k8s_version {
                    line.push_str(&format!(" --image kindest/node:{version}"));
                }
                self.runner.run(&[Cmd::new(line)])?;
            }
            Provider::K0s => {
                self.runner.run(&[
                    Cmd::new("k0s install controller --single"),
                    Cmd::new("k0s start"),
                ])?;
            }
        }

        info!("cluster {name} is up");
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        let name = &self.config.name;
        info!("deleting {:?} cluster {name}...", self.config.provider);

        match self.config.provider {
            Provider::K3s => {
                self.runner
                    .run(&[Cmd::new(format!("k3d cluster delete {name}"))])?;
            }
            Provider::Kind => {
                self.runner
                    .run(&[Cmd::new(format!("kind delete cluster --name {name}"))])?;
            }
            Provider::K0s => {
                self.runner.run(&[
                    Cmd::new("k0s stop"),
                    Cmd::new("k0s reset").tolerate_errors(),
                ])?;
            }
        }

        Ok(())
    }
}
