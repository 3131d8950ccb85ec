//! Remote command execution.
//!
//! A [`RemoteCommand`] is a program plus an argument array. It is rendered into
//! a single shell line only at the transport boundary, with every argument
//! quoted. [`Remote`] broadcasts a command to each host of the target in order
//! and stops at the first host that fails, unless the command tolerates
//! failure.

use std::cell::RefCell;

use serde::Serialize;

use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::ssh::CommandOutput;
use crate::utils::shell;

/// Executes one rendered shell line on one host.
pub trait Transport {
    fn execute(&self, host: &str, command: &str) -> CommandOutput;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
    sudo: bool,
    dir: Option<String>,
    env: Vec<(String, String)>,
    tolerate_failure: bool,
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            sudo: false,
            dir: None,
            env: Vec::new(),
            tolerate_failure: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run with elevated privileges.
    pub fn sudo(mut self) -> Self {
        self.sudo = true;
        self
    }

    /// Scope the command to a working directory. The scope lasts for this
    /// command only: each command is its own remote shell.
    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// A non-zero exit is logged and execution continues.
    pub fn tolerate_failure(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    pub fn tolerates_failure(&self) -> bool {
        self.tolerate_failure
    }

    pub fn render(&self) -> String {
        let mut parts = Vec::new();

        if let Some(dir) = &self.dir {
            parts.push(format!("cd {} &&", shell::quote_path(dir)));
        }

        if self.sudo {
            parts.push("sudo".to_string());
            if !self.env.is_empty() {
                // sudo resets the environment; pass variables through env(1)
                parts.push("env".to_string());
            }
        }

        for (key, value) in &self.env {
            parts.push(shell::env_assignment(key, value));
        }

        parts.push(shell::quote_arg(&self.program));

        if !self.args.is_empty() {
            parts.push(shell::quote_args(&self.args));
        }

        parts.join(" ")
    }
}

impl std::fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostOutput {
    pub host: String,
    pub stdout: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub tolerated_failure: bool,
}

pub struct Remote<'a> {
    transport: &'a dyn Transport,
    hosts: Vec<String>,
}

impl<'a> Remote<'a> {
    pub fn new(transport: &'a dyn Transport, hosts: &[String]) -> Self {
        Self {
            transport,
            hosts: hosts
                .iter()
                .map(|host| host.trim().to_string())
                .filter(|host| !host.is_empty())
                .collect(),
        }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Run on every host in order. The first intolerable failure aborts the rest.
    pub fn run(&self, command: &RemoteCommand) -> Result<Vec<HostOutput>> {
        self.hosts
            .iter()
            .map(|host| self.run_on(host, command))
            .collect()
    }

    pub fn run_on(&self, host: &str, command: &RemoteCommand) -> Result<HostOutput> {
        let rendered = command.render();
        log_status!("remote", "{}: {}", host, rendered);

        let output = self.transport.execute(host, &rendered);

        if !output.success {
            if command.tolerates_failure() {
                log_status!(
                    "remote",
                    "{}: exit {} tolerated, continuing",
                    host,
                    output.exit_code
                );
                return Ok(HostOutput {
                    host: host.to_string(),
                    stdout: output.stdout.trim().to_string(),
                    exit_code: output.exit_code,
                    tolerated_failure: true,
                });
            }

            return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                command: rendered,
                host: host.to_string(),
                exit_code: output.exit_code,
                stdout: output.stdout.trim().to_string(),
                stderr: output.stderr.trim().to_string(),
            }));
        }

        Ok(HostOutput {
            host: host.to_string(),
            stdout: output.stdout.trim().to_string(),
            exit_code: output.exit_code,
            tolerated_failure: false,
        })
    }
}

/// Prints commands instead of running them. Every command succeeds with empty output.
#[derive(Default)]
pub struct DryRunTransport {
    commands: RefCell<Vec<String>>,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands seen so far, as `host: command`.
    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl Transport for DryRunTransport {
    fn execute(&self, host: &str, command: &str) -> CommandOutput {
        log_status!("dry-run", "{}: {}", host, command);
        self.commands
            .borrow_mut()
            .push(format!("{}: {}", host, command));
        CommandOutput::ok("")
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;
    use crate::error::ErrorCode;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn render_plain_command() {
        let cmd = RemoteCommand::new("git").args(["fetch", "--all"]);
        assert_eq!(cmd.render(), "git fetch --all");
    }

    #[test]
    fn render_scopes_directory_and_quotes_args() {
        let cmd = RemoteCommand::new("git")
            .args(["commit", "-m", "it's done"])
            .in_dir("api");
        assert_eq!(cmd.render(), "cd 'api' && git commit -m 'it'\\''s done'");
    }

    #[test]
    fn render_sudo_with_env_goes_through_env() {
        let cmd = RemoteCommand::new("pm2")
            .arg("start")
            .env("NODE_ENV", "production")
            .sudo();
        assert_eq!(cmd.render(), "sudo env NODE_ENV=production pm2 start");
    }

    #[test]
    fn render_env_without_sudo() {
        let cmd = RemoteCommand::new("pm2")
            .arg("start")
            .env("NODE_PATH", "lib")
            .in_dir("api");
        assert_eq!(cmd.render(), "cd 'api' && NODE_PATH=lib pm2 start");
    }

    #[test]
    fn injection_attempt_stays_one_argument() {
        let cmd = RemoteCommand::new("git").args(["checkout", "-f", "x; rm -rf ~"]);
        assert_eq!(cmd.render(), "git checkout -f 'x; rm -rf ~'");
    }

    #[test]
    fn run_broadcasts_to_every_host_in_order() {
        let transport = RecordingTransport::new().respond("hostname", "box");
        let remote = Remote::new(&transport, &hosts(&["a", "b"]));

        let outputs = remote.run(&RemoteCommand::new("hostname")).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].host, "a");
        assert_eq!(outputs[1].stdout, "box");
        assert_eq!(
            transport.calls(),
            vec![
                ("a".to_string(), "hostname".to_string()),
                ("b".to_string(), "hostname".to_string())
            ]
        );
    }

    #[test]
    fn first_failure_aborts_remaining_hosts() {
        let transport = RecordingTransport::new().fail_on("npm", 1);
        let remote = Remote::new(&transport, &hosts(&["a", "b"]));

        let err = remote
            .run(&RemoteCommand::new("npm").arg("install"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
        assert_eq!(err.details["host"], "a");
        assert!(transport.commands_for("b").is_empty());
    }

    #[test]
    fn tolerated_failure_continues() {
        let transport = RecordingTransport::new().fail_on("forever", 1);
        let remote = Remote::new(&transport, &hosts(&["a", "b"]));

        let outputs = remote
            .run(&RemoteCommand::new("forever").arg("stopall").tolerate_failure())
            .unwrap();
        assert!(outputs.iter().all(|o| o.tolerated_failure));
        assert_eq!(transport.calls().len(), 2);
    }

    #[test]
    fn stdout_is_trimmed() {
        let transport = RecordingTransport::new().respond("rev-parse", "  abc123\n");
        let remote = Remote::new(&transport, &hosts(&["a"]));
        let out = remote
            .run_on("a", &RemoteCommand::new("git").args(["rev-parse", "HEAD"]))
            .unwrap();
        assert_eq!(out.stdout, "abc123");
    }

    #[test]
    fn blank_hosts_are_dropped() {
        let transport = RecordingTransport::new();
        let remote = Remote::new(&transport, &hosts(&["a", " ", ""]));
        assert_eq!(remote.hosts(), ["a".to_string()]);
    }

    #[test]
    fn dry_run_records_without_failing() {
        let transport = DryRunTransport::new();
        let remote = Remote::new(&transport, &hosts(&["a"]));
        remote.run(&RemoteCommand::new("rm").args(["-rf", "api"])).unwrap();
        assert_eq!(transport.commands(), vec!["a: rm -rf api"]);
    }
}
