//! Composite commands.
//!
//! Each composite is an ordered list of lifecycle steps run as one unit. The
//! first failing step ends the composite; nothing is compensated or retried.
//! The error then says which steps already finished and which one failed.

use serde::Serialize;
use serde_json::json;

use crate::defaults::StagehandConfig;
use crate::environment::Environment;
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::note;
use crate::remote::{HostOutput, Remote, Transport};
use crate::session::{DeployTarget, EnvironmentTarget};
use crate::tracking::{DeploymentTracker, TrackingRecord};

/// Asks the operator for a value that was not passed on the command line.
pub trait Prompt {
    fn ask(&self, field: &str, message: &str) -> Result<String>;
}

/// Who deploys, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub author: String,
    pub note: Option<String>,
}

/// Fill in the author and note for a deploy, prompting for what is missing.
///
/// The author is always required. A note is required only where the
/// environment asks for one, but any note given is validated since it lands
/// in the same tracking record.
pub fn resolve_request(
    target: &EnvironmentTarget,
    author: Option<&str>,
    note: Option<&str>,
    prompt: &dyn Prompt,
) -> Result<DeployRequest> {
    let author = match author {
        Some(author) => author.to_string(),
        None => prompt.ask("author", "Who is deploying? ")?,
    };
    let author = note::validate_author(&author)?;

    let note = match note {
        Some(note) => Some(note::validate_note(note)?),
        None if target.settings.require_note => {
            let answer = prompt.ask(
                "note",
                &format!("Describe this {} deploy: ", target.environment),
            )?;
            Some(note::validate_note(&answer)?)
        }
        None => None,
    };

    Ok(DeployRequest { author, note })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
    pub command: String,
    pub environment: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub hosts: Vec<String>,
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<TrackingRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processes: Option<Vec<HostOutput>>,
}

/// Runs named steps in order and remembers how far it got.
struct Progress {
    command: String,
    completed: Vec<String>,
}

impl Progress {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            completed: Vec::new(),
        }
    }

    fn step<T>(&mut self, name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        log_status!("step", "{}: {}", self.command, name);
        match f() {
            Ok(value) => {
                self.completed.push(name.to_string());
                Ok(value)
            }
            Err(err) => {
                log_status!(
                    "step",
                    "{}: {} failed after {} completed step(s)",
                    self.command,
                    name,
                    self.completed.len()
                );
                let hint = if self.completed.is_empty() {
                    format!("'{}' failed before any step completed", name)
                } else {
                    format!(
                        "Completed before the failure: {}. Resume by hand from '{}'",
                        self.completed.join(", "),
                        name
                    )
                };
                Err(err
                    .with_detail("command", json!(self.command))
                    .with_detail("completedSteps", json!(self.completed))
                    .with_detail("failedStep", json!(name))
                    .with_hint(hint))
            }
        }
    }

    fn finish(self, target: &EnvironmentTarget, branch: Option<String>) -> CompositeResult {
        log_status!("step", "{}: done", self.command);
        CompositeResult {
            command: self.command,
            environment: target.environment,
            branch,
            hosts: target.hosts().to_vec(),
            steps: self.completed,
            commit: None,
            tracking: None,
            processes: None,
        }
    }
}

/// Runs composites against the hosts of a resolved target.
pub struct Deployer<'a> {
    config: &'a StagehandConfig,
    transport: &'a dyn Transport,
    tracker: &'a dyn DeploymentTracker,
}

impl<'a> Deployer<'a> {
    pub fn new(
        config: &'a StagehandConfig,
        transport: &'a dyn Transport,
        tracker: &'a dyn DeploymentTracker,
    ) -> Self {
        Self {
            config,
            transport,
            tracker,
        }
    }

    fn remote(&self, target: &EnvironmentTarget) -> Remote<'a> {
        Remote::new(self.transport, target.hosts())
    }

    /// Clone, check out, install and boot on fresh hosts.
    pub fn setup(&self, target: &DeployTarget) -> Result<CompositeResult> {
        let remote = self.remote(&target.environment);
        let lifecycle = Lifecycle::new(&remote, self.config);
        let mut progress = Progress::new("setup");

        progress.step("clone", || lifecycle.clone_repository())?;
        progress.step("checkout", || lifecycle.checkout_latest(&target.branch))?;
        progress.step("install", || lifecycle.install_requirements())?;
        progress.step("boot", || lifecycle.boot(&target.environment))?;

        Ok(progress.finish(&target.environment, Some(target.branch.to_string())))
    }

    /// Check out the latest branch tip, record it, install and reboot.
    pub fn deploy(&self, target: &DeployTarget, request: &DeployRequest) -> Result<CompositeResult> {
        let remote = self.remote(&target.environment);
        let lifecycle = Lifecycle::new(&remote, self.config);
        let mut progress = Progress::new("deploy");

        progress.step("checkout", || lifecycle.checkout_latest(&target.branch))?;
        let record = progress.step("track", || {
            let commit = lifecycle.current_commit()?;
            let record = TrackingRecord::new(
                target,
                &commit,
                &self.config.project,
                &request.author,
                request.note.as_deref(),
            );
            self.tracker.record(&record)?;
            Ok(record)
        })?;
        progress.step("install", || lifecycle.install_requirements())?;
        progress.step("reboot", || lifecycle.reboot(&target.environment))?;

        let mut result = progress.finish(&target.environment, Some(target.branch.to_string()));
        result.commit = Some(record.commit.clone());
        result.tracking = Some(record);
        Ok(result)
    }

    /// Check out the branch tip, then hard-reset to `commit`. Nothing re-fetches afterwards.
    pub fn rollback(&self, target: &DeployTarget, commit: &str) -> Result<CompositeResult> {
        let remote = self.remote(&target.environment);
        let lifecycle = Lifecycle::new(&remote, self.config);
        let mut progress = Progress::new("rollback");

        progress.step("checkout", || lifecycle.checkout_latest(&target.branch))?;
        progress.step("reset", || lifecycle.reset_to_commit(commit))?;
        progress.step("install", || lifecycle.install_requirements())?;
        progress.step("reboot", || lifecycle.reboot(&target.environment))?;

        let mut result = progress.finish(&target.environment, Some(target.branch.to_string()));
        result.commit = Some(commit.to_string());
        Ok(result)
    }

    pub fn reboot(&self, target: &DeployTarget) -> Result<CompositeResult> {
        let remote = self.remote(&target.environment);
        let lifecycle = Lifecycle::new(&remote, self.config);
        let mut progress = Progress::new("reboot");

        progress.step("reboot", || lifecycle.reboot(&target.environment))?;

        Ok(progress.finish(&target.environment, Some(target.branch.to_string())))
    }

    /// Process table per host. Needs no branch.
    pub fn list(&self, target: &EnvironmentTarget) -> Result<CompositeResult> {
        let remote = self.remote(target);
        let lifecycle = Lifecycle::new(&remote, self.config);
        let mut progress = Progress::new("list");

        let processes = progress.step("list", || lifecycle.list_processes())?;

        let mut result = progress.finish(target, None);
        result.processes = Some(processes);
        Ok(result)
    }

    /// Remove the managed processes and the checkout. No confirmation.
    pub fn destroy(&self, target: &DeployTarget) -> Result<CompositeResult> {
        let remote = self.remote(&target.environment);
        let lifecycle = Lifecycle::new(&remote, self.config);
        let mut progress = Progress::new("shiva_the_destroyer");

        progress.step("destroy", || lifecycle.destroy())?;

        Ok(progress.finish(&target.environment, Some(target.branch.to_string())))
    }
}
