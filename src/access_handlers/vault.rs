use anyhow::{bail, Context, Result};
use simplelog::*;

use crate::runner::{Cmd, Runner};

/// bitwarden access check: is the bw CLI present and authenticated?
pub fn check(runner: &dyn Runner) -> Result<()> {
    let out = runner.run(&[Cmd::new("bw status").quiet()])?;
    let status: serde_json::Value =
        serde_json::from_str(&out).context("could not parse bw status output")?;

    match status["status"].as_str() {
        Some("unlocked") => debug!("vault is unlocked"),
        Some("locked") => debug!("vault is locked (will unlock when needed)"),
        Some("unauthenticated") => {
            bail!("vault is unauthenticated; run `bw login` or set BW_CLIENTID/BW_CLIENTSECRET")
        }
        other => bail!("unexpected bw status: {other:?}"),
    }

    Ok(())
}
