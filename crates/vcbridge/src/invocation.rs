//! Invocation shim for the external CLI tool.
//!
//! Builds a child command with a [`CliEnvironment`] merged over the inherited
//! process environment. Building never spawns; [`CliInvocation::run`] does.

use std::ffi::OsString;
use std::process::Stdio;

use tokio::process::Command;

use crate::cli_env::CliEnvironment;
use crate::error::Result;

/// Environment variable overriding the tool binary.
pub const PROGRAM_ENV: &str = "VCBRIDGE_GOVC";

/// Default tool name, resolved on PATH by the OS.
pub const DEFAULT_PROGRAM: &str = "govc";

/// Resolve the tool binary: `VCBRIDGE_GOVC` when set and non-blank, else `govc`.
pub fn default_program() -> String {
    if let Ok(p) = std::env::var(PROGRAM_ENV) {
        let p = p.trim();
        if !p.is_empty() {
            return p.to_string();
        }
    }
    DEFAULT_PROGRAM.to_string()
}

/// Captured result of a finished invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A pending call of the CLI tool with a mapped environment.
#[derive(Debug, Clone)]
pub struct CliInvocation {
    program: String,
    args: Vec<OsString>,
    env: CliEnvironment,
}

impl CliInvocation {
    /// Invocation of [`default_program`] with `env`.
    pub fn new(env: CliEnvironment) -> Self {
        Self::with_program(default_program(), env)
    }

    pub fn with_program(program: impl Into<String>, env: CliEnvironment) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the command. The four mapped variables override any inherited
    /// values with the same names.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in self.env.vars() {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);

        tracing::debug!(
            program = %self.program,
            args = self.args.len(),
            "built CLI command with mapped environment"
        );
        cmd
    }

    /// Spawn the command, wait for it, and capture its output.
    pub async fn run(&self) -> Result<CommandOutput> {
        let output = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
