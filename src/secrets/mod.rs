// Routes generated credentials to one of two backends: a Bitwarden login
// item, or a native cluster Secret applied through the manifest path. Both
// backends share the same duplicate policy.

pub mod password;
pub mod vault;

use anyhow::{anyhow, bail, Result};
use fully_pub::fully_pub;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use simplelog::*;

use crate::applier::{Applier, ManifestResource};
use crate::runner::{Cmd, Runner};
use self::vault::{LoginItem, Vault};

/// Label stamped on cluster secrets we create, so they can be found (and
/// picked up by Argo CD ApplicationSet generators) later.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// One logical credential and where it should go.
#[derive(Debug, Clone)]
#[fully_pub]
struct Credential {
    name: String,
    namespace: String,
    /// field name -> secret value; "username"/"password" are special-cased
    /// into the vault login, the rest become custom fields
    fields: IndexMap<String, String>,
    /// target hostname, recorded as the login item's uri
    hostname: Option<String>,
    use_vault: bool,
}

/// What to do when a credential create hits a name that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// overwrite the one existing item in place
    Edit,
    /// create another item under the same name (vault only)
    Duplicate,
    /// keep the existing item, skip creation
    NoAction,
    /// defer the decision to an interactive prompt
    #[default]
    Ask,
}

/// Where a routed credential ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRef {
    VaultItem { id: String },
    ClusterSecret { name: String, namespace: String },
}

/// Decides a duplicate policy when the configured one is `ask`. Split out
/// as a trait so tests don't need a terminal.
pub trait PolicyPrompt {
    /// Returns the chosen policy plus whether to remember it for the rest
    /// of the run. Must not return `Ask`.
    fn choose(&self, name: &str, existing: usize) -> Result<(DuplicatePolicy, bool)>;
}

pub struct InteractivePrompt;

impl PolicyPrompt for InteractivePrompt {
    fn choose(&self, name: &str, existing: usize) -> Result<(DuplicatePolicy, bool)> {
        let options = vec![
            "edit (overwrite the existing item)",
            "duplicate (create another item with the same name)",
            "no_action (keep the existing item as-is)",
        ];
        let picked = inquire::Select::new(
            &format!("{existing} item(s) named {name:?} already exist. What should happen?"),
            options,
        )
        .prompt()?;

        let policy = match picked.split(' ').next() {
            Some("edit") => DuplicatePolicy::Edit,
            Some("duplicate") => DuplicatePolicy::Duplicate,
            _ => DuplicatePolicy::NoAction,
        };

        let remember = inquire::Confirm::new("Remember this choice for the rest of the run?")
            .with_default(false)
            .prompt()?;

        Ok((policy, remember))
    }
}

pub struct SecretRouter<'a> {
    runner: &'a dyn Runner,
    vault: Option<&'a Vault<'a>>,
    policy: DuplicatePolicy,
    prompt: &'a dyn PolicyPrompt,
}

impl<'a> SecretRouter<'a> {
    pub fn new(
        runner: &'a dyn Runner,
        vault: Option<&'a Vault<'a>>,
        policy: DuplicatePolicy,
        prompt: &'a dyn PolicyPrompt,
    ) -> Self {
        SecretRouter {
            runner,
            vault,
            policy,
            prompt,
        }
    }

    pub fn route(&mut self, cred: &Credential) -> Result<CredentialRef> {
        if cred.use_vault {
            self.route_vault(cred)
        } else {
            self.route_native(cred)
        }
    }

    /// Resolve the effective policy for a name collision. `ask` defers to
    /// the prompt; so does `edit` when several same-named items exist,
    /// since editing "the" item is ambiguous then.
    fn resolve_policy(&mut self, name: &str, existing: usize) -> Result<DuplicatePolicy> {
        let mut policy = self.policy;

        if policy == DuplicatePolicy::Ask
            || (policy == DuplicatePolicy::Edit && existing > 1)
        {
            let (chosen, remember) = self.prompt.choose(name, existing)?;
            if chosen == DuplicatePolicy::Ask {
                bail!("duplicate prompt must resolve to a concrete policy");
            }
            if remember {
                self.policy = chosen;
            }
            policy = chosen;
        }

        Ok(policy)
    }

    fn vault(&self) -> Result<&'a Vault<'a>> {
        self.vault
            .ok_or(anyhow!("vault routing requested but no vault session is open"))
    }

    fn route_vault(&mut self, cred: &Credential) -> Result<CredentialRef> {
        let existing = self.vault()?.find_items(&cred.name)?;
        let item = login_item(cred);

        if existing.is_empty() {
            let id = self.vault()?.create_login(&item)?;
            return Ok(CredentialRef::VaultItem { id });
        }

        match self.resolve_policy(&cred.name, existing.len())? {
            DuplicatePolicy::Edit => {
                if existing.len() > 1 {
                    bail!(
                        "{} vault items named {:?} exist, cannot edit one unambiguously",
                        existing.len(),
                        cred.name
                    );
                }
                let id = self.vault()?.edit_login(&existing[0].id, &item)?;
                Ok(CredentialRef::VaultItem { id })
            }
            DuplicatePolicy::Duplicate => {
                let id = self.vault()?.create_login(&item)?;
                Ok(CredentialRef::VaultItem { id })
            }
            DuplicatePolicy::NoAction => {
                info!("vault item {:?} already exists, keeping it", cred.name);
                Ok(CredentialRef::VaultItem {
                    id: existing[0].id.clone(),
                })
            }
            DuplicatePolicy::Ask => unreachable!("resolve_policy never returns ask"),
        }
    }

    fn route_native(&mut self, cred: &Credential) -> Result<CredentialRef> {
        let reference = CredentialRef::ClusterSecret {
            name: cred.name.clone(),
            namespace: cred.namespace.clone(),
        };

        // the target namespace may not exist yet
        self.runner.run(&[Cmd::new(format!(
            "kubectl create namespace {}",
            cred.namespace
        ))
        .tolerate_errors()])?;

        let probe = Cmd::new(format!(
            "kubectl get secret {} -n {} --ignore-not-found --no-headers",
            cred.name, cred.namespace
        ))
        .quiet()
        .tolerate_errors();
        let exists = !self.runner.run_one(&probe)?.stdout.trim().is_empty();

        if exists {
            match self.resolve_policy(&cred.name, 1)? {
                DuplicatePolicy::NoAction => {
                    info!("secret {}/{} already exists, keeping it", cred.namespace, cred.name);
                    return Ok(reference);
                }
                DuplicatePolicy::Duplicate => bail!(
                    "secret {}/{} already exists, and cluster secrets cannot share a name",
                    cred.namespace,
                    cred.name
                ),
                // kubectl apply below overwrites the secret in place
                DuplicatePolicy::Edit => (),
                DuplicatePolicy::Ask => unreachable!("resolve_policy never returns ask"),
            }
        }

        Applier::new(self.runner).apply(&[secret_manifest(cred)?], None)?;
        Ok(reference)
    }
}

/// A credential's shape as a vault login item.
fn login_item(cred: &Credential) -> LoginItem {
    let mut item = LoginItem {
        name: cred.name.clone(),
        uri: cred.hostname.clone(),
        ..Default::default()
    };

    for (name, value) in &cred.fields {
        match name.as_str() {
            "username" => item.username = Some(value.clone()),
            "password" => item.password = Some(value.clone()),
            _ => item.fields.push((name.clone(), value.clone())),
        }
    }

    item
}

/// A credential's shape as a v1 Secret manifest.
fn secret_manifest(cred: &Credential) -> Result<ManifestResource> {
    Ok(ManifestResource::new("v1", "Secret", &cred.name)
        .namespace(&cred.namespace)
        .label(MANAGED_BY_LABEL, "homestead")
        .with("type", "Opaque".into())
        .with("stringData", serde_yml::to_value(&cred.fields)?))
}
