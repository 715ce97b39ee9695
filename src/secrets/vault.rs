// Bitwarden vault access via the `bw` CLI.
//
// Session lifecycle: a session token either comes in from the environment
// (BW_SESSION) or this run unlocks the vault itself. We only ever lock a
// session we created; locking a caller-supplied session would break their
// external vault session.

use std::env;

use anyhow::{bail, Context, Result};
use base64::prelude::*;
use serde::Deserialize;
use serde_json::json;
use simplelog::*;

use crate::runner::{Cmd, Runner};

/// All BW_* environment the vault layer reads, gathered in one place so
/// nothing else in the crate touches process env for vault config.
#[derive(Debug, Clone, Default)]
pub struct VaultEnv {
    pub session: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub host: Option<String>,
}

impl VaultEnv {
    pub fn load() -> Self {
        VaultEnv {
            session: env::var("BW_SESSION").ok(),
            password: env::var("BW_PASSWORD").ok(),
            client_id: env::var("BW_CLIENTID").ok(),
            client_secret: env::var("BW_CLIENTSECRET").ok(),
            host: env::var("BW_HOST").ok(),
        }
    }
}

/// A vault item as `bw list items` reports it. Only the fields we route on.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultItem {
    pub id: String,
    pub name: String,
}

/// A login item to be created or edited. Username/password land under
/// `login`, everything else becomes hidden custom fields.
#[derive(Debug, Clone, Default)]
pub struct LoginItem {
    pub name: String,
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub fields: Vec<(String, String)>,
}

impl LoginItem {
    /// The JSON shape `bw create item` expects, base64'd by the caller.
    fn to_json(&self) -> serde_json::Value {
        let custom_fields: Vec<_> = self
            .fields
            .iter()
            // type 1 = hidden field
            .map(|(name, value)| json!({"name": name, "value": value, "type": 1, "linkedId": null}))
            .collect();
        let uris: Vec<_> = self
            .uri
            .iter()
            .map(|uri| json!({"match": null, "uri": uri}))
            .collect();

        json!({
            "organizationId": null,
            "collectionIds": [],
            "folderId": null,
            "type": 1,
            "name": self.name,
            "notes": null,
            "favorite": false,
            "fields": custom_fields,
            "login": {
                "uris": uris,
                "username": self.username,
                "password": self.password,
                "totp": null,
            },
        })
    }

    fn encoded(&self) -> Result<String> {
        let raw = serde_json::to_string(&self.to_json())
            .with_context(|| format!("could not serialize vault item {}", self.name))?;
        Ok(BASE64_STANDARD.encode(raw))
    }
}

pub struct Vault<'a> {
    runner: &'a dyn Runner,
    session: String,
    /// true only when this run performed the unlock itself
    owns_session: bool,
}

impl<'a> Vault<'a> {
    pub fn with_session(runner: &'a dyn Runner, session: &str, owns_session: bool) -> Self {
        Vault {
            runner,
            session: session.to_string(),
            owns_session,
        }
    }

    /// Unlock the vault, or adopt the session from the environment.
    ///
    /// Order of preference: BW_SESSION (external session, never locked by
    /// us), then api-key login + BW_PASSWORD unlock, then an interactive
    /// unlock prompt handled by `bw` itself.
    pub fn open(runner: &'a dyn Runner, env: &VaultEnv) -> Result<Self> {
        if let Some(host) = &env.host {
            runner.run(&[Cmd::new(format!("bw config server {host}"))])?;
        }

        if let Some(session) = &env.session {
            debug!("using externally-supplied vault session");
            return Ok(Vault::with_session(runner, session, false));
        }

        let out = runner.run(&[Cmd::new("bw status").quiet()])?;
        let status: serde_json::Value =
            serde_json::from_str(&out).context("could not parse bw status output")?;

        if status["status"] == "unauthenticated" {
            match (&env.client_id, &env.client_secret) {
                (Some(id), Some(secret)) => {
                    info!("logging into vault with api key...");
                    runner.run(&[Cmd::new("bw login --apikey")
                        .quiet()
                        .env("BW_CLIENTID", id)
                        .env("BW_CLIENTSECRET", secret)])?;
                }
                _ => bail!(
                    "vault is unauthenticated and BW_CLIENTID/BW_CLIENTSECRET are not set; \
                     run `bw login` first or supply api credentials"
                ),
            }
        }

        info!("unlocking vault...");
        let unlock = match &env.password {
            Some(password) => Cmd::new("bw unlock --raw --passwordenv BW_PASSWORD")
                .quiet()
                .env("BW_PASSWORD", password),
            // no password supplied, let bw prompt the user directly
            None => Cmd::new("bw unlock --raw").quiet(),
        };
        let session = runner.run(&[unlock])?;
        if session.is_empty() {
            bail!("bw unlock returned no session token");
        }

        Ok(Vault::with_session(runner, &session, true))
    }

    fn bw(&self, args: &str) -> Cmd {
        Cmd::new(format!("bw {args}"))
            .quiet()
            .env("BW_SESSION", &self.session)
    }

    /// Items whose name matches exactly. `bw list --search` also matches
    /// substrings and notes, so filter what comes back.
    pub fn find_items(&self, name: &str) -> Result<Vec<VaultItem>> {
        let out = self
            .runner
            .run(&[self.bw(&format!("list items --search '{name}'"))])?;

        let items: Vec<VaultItem> =
            serde_json::from_str(if out.is_empty() { "[]" } else { out.as_str() })
                .context("could not parse bw list items output")?;

        Ok(items.into_iter().filter(|item| item.name == name).collect())
    }

    /// Create a login item, returning its vault id.
    pub fn create_login(&self, item: &LoginItem) -> Result<String> {
        debug!("creating vault item {}", item.name);
        let out = self
            .runner
            .run(&[self.bw(&format!("create item {}", item.encoded()?))])?;

        let created: VaultItem =
            serde_json::from_str(&out).context("could not parse bw create item output")?;
        Ok(created.id)
    }

    /// Overwrite an existing login item in place.
    pub fn edit_login(&self, id: &str, item: &LoginItem) -> Result<String> {
        debug!("editing vault item {} ({id})", item.name);
        self.runner
            .run(&[self.bw(&format!("edit item {id} {}", item.encoded()?))])?;
        Ok(id.to_string())
    }

    /// Lock the vault again, but only if we unlocked it. No-op for sessions
    /// supplied from outside.
    pub fn lock(&mut self) -> Result<()> {
        if !self.owns_session {
            debug!("vault session is external, leaving it unlocked");
            return Ok(());
        }

        info!("locking vault...");
        self.runner.run(&[self.bw("lock")])?;
        self.owns_session = false;
        Ok(())
    }
}
