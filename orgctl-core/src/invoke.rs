//! Process invoker and response normalizer for the platform CLI.
//!
//! Every subcommand funnels its external invocations through [`CliInvoker`]:
//! - Real implementation over `tokio::process` (argv arrays, never a shell)
//! - Mock implementation for testing
//! - One uniform failure contract: a typed [`OrgError::ExternalCommand`]
//!
//! The wrapped CLI signals success and failure inconsistently (JSON on
//! stdout, JSON on stderr, plain text on either); [`normalize`] insulates
//! callers from that.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::error::{OrgError, Result};

/// Default cap on captured stdout+stderr, matching the wrapped CLI's
/// historical 10 MiB buffer limit.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// A scalar flag value, rendered mechanically onto a command line.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for FlagValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for FlagValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for FlagValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// An insertion-ordered set of `--name value` flags.
///
/// Two renderings exist on purpose: [`FlagSet::render_onto`] produces the
/// human-readable command line used in traces and error text, while
/// [`FlagSet::to_args`] produces the argv tokens that actually execute.
/// Values never pass through a shell.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    flags: Vec<(String, FlagValue)>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a flag. Order of insertion is preserved in both renderings.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FlagValue>) {
        self.flags.push((name.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Render flags onto a base command string, in insertion order.
    ///
    /// Booleans render as bare switches, strings are wrapped in double
    /// quotes, integers are unquoted. No escaping of embedded quotes is
    /// performed; this string is for display, not execution.
    pub fn render_onto(&self, base: &str) -> String {
        let mut command = base.to_string();
        for (name, value) in &self.flags {
            command.push_str(&format!(" --{} ", name));
            match value {
                FlagValue::Bool(_) => {}
                FlagValue::Str(s) => command.push_str(&format!("\"{}\"", s)),
                FlagValue::Int(n) => command.push_str(&n.to_string()),
            }
        }
        command
    }

    /// Expand flags to argv tokens: `--name` for booleans, `--name value`
    /// for everything else. Values are passed through verbatim.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.flags.len() * 2);
        for (name, value) in &self.flags {
            args.push(format!("--{}", name));
            match value {
                FlagValue::Bool(_) => {}
                FlagValue::Str(s) => args.push(s.clone()),
                FlagValue::Int(n) => args.push(n.to_string()),
            }
        }
        args
    }
}

/// Raw captured output of one external invocation
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Normalize captured output into the single invoker contract.
///
/// Exit 0 yields the stdout text, falling back to stderr when stdout is
/// empty. Non-zero exit yields an [`OrgError::ExternalCommand`] carrying
/// stderr, falling back to stdout. Output beyond `max_output_bytes` is a
/// failure regardless of exit status.
pub fn normalize(output: RawOutput, max_output_bytes: usize) -> Result<String> {
    if output.stdout.len() + output.stderr.len() > max_output_bytes {
        return Err(OrgError::external_command(format!(
            "captured output exceeded {} bytes",
            max_output_bytes
        )));
    }

    if output.status == 0 {
        if !output.stdout.is_empty() {
            Ok(output.stdout)
        } else {
            Ok(output.stderr)
        }
    } else if !output.stderr.is_empty() {
        Err(OrgError::external_command(output.stderr))
    } else {
        Err(OrgError::external_command(output.stdout))
    }
}

/// Trait for platform-CLI invocation (testable)
#[async_trait]
pub trait CliInvoker: Send + Sync {
    /// Run the CLI with the given argv tokens and capture its output.
    async fn invoke(&self, args: &[String]) -> Result<RawOutput>;

    /// Run and normalize with an explicit output cap.
    async fn run_with_limit(&self, args: &[String], max_output_bytes: usize) -> Result<String> {
        let output = self.invoke(args).await?;
        normalize(output, max_output_bytes)
    }

    /// Run and normalize with the default 10 MiB output cap.
    async fn run(&self, args: &[String]) -> Result<String> {
        self.run_with_limit(args, MAX_OUTPUT_BYTES).await
    }
}

/// Run a `--json` convention command and unwrap its `result` field.
///
/// The wrapped CLI emits `{"status": 0, "result": {...}}` on stdout for
/// `--json` invocations. Anything that does not parse, or parses without a
/// `result` field, is an [`OrgError::UnexpectedOutput`].
pub async fn run_json(cli: &dyn CliInvoker, args: &[String]) -> Result<Value> {
    let text = cli.run(args).await?;
    let context = args.first().cloned().unwrap_or_default();
    let value: Value =
        serde_json::from_str(&text).map_err(|err| OrgError::json(context.clone(), err))?;
    value
        .get("result")
        .cloned()
        .ok_or_else(|| OrgError::unexpected_output(context))
}

/// Real invoker using tokio::process
#[derive(Debug, Clone)]
pub struct SfdxCli {
    binary: String,
}

impl SfdxCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for SfdxCli {
    fn default() -> Self {
        Self::new("sfdx")
    }
}

#[async_trait]
impl CliInvoker for SfdxCli {
    async fn invoke(&self, args: &[String]) -> Result<RawOutput> {
        debug!("invoking {} {}", self.binary, args.join(" "));

        let spawned = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(err) => {
                let message = if which::which(&self.binary).is_err() {
                    format!(
                        "'{}' not found on PATH. Install the platform CLI or set [cli].binary in the config",
                        self.binary
                    )
                } else {
                    format!("failed to spawn '{}': {}", self.binary, err)
                };
                return Err(OrgError::external_command(message));
            }
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| OrgError::external_command(format!("failed to await '{}': {}", self.binary, err)))?;

        Ok(RawOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Mock invoker for testing: returns queued responses in order
#[derive(Default)]
pub struct MockCli {
    responses: std::sync::Mutex<Vec<RawOutput>>,
    calls: std::sync::Mutex<Vec<Vec<String>>>,
}

impl MockCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return on the next invocation
    pub fn add_response(&self, output: RawOutput) {
        self.responses.lock().unwrap().push(output);
    }

    /// Queue a successful invocation with the given stdout
    pub fn add_stdout(&self, stdout: impl Into<String>) {
        self.add_response(RawOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        });
    }

    /// Queue a failed invocation with the given stderr
    pub fn add_failure(&self, stderr: impl Into<String>) {
        self.add_response(RawOutput {
            status: 1,
            stdout: String::new(),
            stderr: stderr.into(),
        });
    }

    /// Argv tokens of every invocation seen so far
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CliInvoker for MockCli {
    async fn invoke(&self, args: &[String]) -> Result<RawOutput> {
        self.calls.lock().unwrap().push(args.to_vec());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(RawOutput {
                status: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        } else {
            Ok(responses.remove(0))
        }
    }
}
