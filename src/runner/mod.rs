// Runs external CLI tools (helm, kubectl, k3d/kind/k0s, bw, argocd) and
// captures what they said. Everything else in this crate sits on top of this.

use std::collections::HashMap as Map;

use anyhow::{bail, Context, Result};
use simplelog::*;

/// One shell invocation, plus how to treat it when it goes wrong.
#[derive(Debug, Clone)]
pub struct Cmd {
    pub line: String,
    /// log-and-continue instead of aborting the batch
    pub error_ok: bool,
    pub env: Map<String, String>,
    /// don't echo this command (it carries secret material)
    pub quiet: bool,
}

impl Cmd {
    pub fn new(line: impl Into<String>) -> Self {
        Cmd {
            line: line.into(),
            error_ok: false,
            env: Map::new(),
            quiet: false,
        }
    }

    pub fn tolerate_errors(mut self) -> Self {
        self.error_ok = true;
        self
    }

    pub fn env(mut self, key: &str, val: &str) -> Self {
        self.env.insert(key.to_string(), val.to_string());
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Command line as shown to the user. Anything after "password"
    /// (matched case-insensitively) is truncated so flag values don't
    /// end up on screen. Best-effort only;
    /// commands that embed secrets some other way should be marked quiet.
    pub fn echo_line(&self) -> String {
        const NEEDLE: &str = "password";

        // match case-insensitively on the line itself; lowercasing the whole
        // line first can shift byte offsets for non-ascii characters
        let hit = self.line.char_indices().find(|(idx, _)| {
            self.line
                .get(*idx..idx + NEEDLE.len())
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(NEEDLE))
        });

        match hit {
            Some((idx, _)) => format!("{}password [...]", &self.line[..idx]),
            None => self.line.clone(),
        }
    }
}

/// Captured streams + exit status of one finished command.
#[derive(Debug, Clone, Default)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl CmdOutput {
    /// Failure is judged on exit status alone. Scanning stdout/stderr for
    /// the word "error" misclassifies tools both ways, so we don't.
    pub fn failed(&self) -> bool {
        self.status != 0
    }

    pub fn ok(stdout: &str) -> Self {
        CmdOutput {
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    pub fn err(status: i32, stderr: &str) -> Self {
        CmdOutput {
            stderr: stderr.to_string(),
            status,
            ..Default::default()
        }
    }
}

/// Executes commands. A trait so tests can substitute a scripted fake for
/// the real shell.
pub trait Runner {
    fn run_one(&self, cmd: &Cmd) -> Result<CmdOutput>;

    /// Run a batch strictly in order, returning the last non-empty stdout.
    ///
    /// Batches have implicit data dependencies (create namespace, then
    /// create things in it), so a failed command with `error_ok` unset
    /// aborts immediately and the rest of the batch never runs.
    fn run(&self, batch: &[Cmd]) -> Result<String> {
        let mut last_output = String::new();

        for cmd in batch {
            if !cmd.quiet {
                info!("<bright-black>$ {}</>", cmd.echo_line());
            }

            let output = self.run_one(cmd)?;

            if output.failed() {
                if cmd.error_ok {
                    warn!(
                        "command failed (exit {}), continuing: {}",
                        output.status,
                        cmd.echo_line()
                    );
                } else {
                    bail!(
                        "command failed (exit {}): {}\n{}",
                        output.status,
                        cmd.echo_line(),
                        output.stderr.trim()
                    );
                }
            }

            let stdout = output.stdout.trim();
            if !stdout.is_empty() {
                last_output = stdout.to_string();
            }
        }

        Ok(last_output)
    }
}

/// The real thing: forks `sh -c <line>` via duct and blocks until it exits.
pub struct ShellRunner;

impl Runner for ShellRunner {
    fn run_one(&self, cmd: &Cmd) -> Result<CmdOutput> {
        let mut expr = duct::cmd!("sh", "-c", &cmd.line)
            .stdout_capture()
            .stderr_capture()
            .unchecked();

        for (key, val) in &cmd.env {
            expr = expr.env(key, val);
        }

        let out = expr
            .run()
            .with_context(|| format!("could not spawn command: {}", cmd.echo_line()))?;

        Ok(CmdOutput {
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            status: out.status.code().unwrap_or(-1),
        })
    }
}
