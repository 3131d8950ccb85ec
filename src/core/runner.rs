//! Runs tasks left to right.
//!
//! Selectors fill in the [`Selection`]; every other task resolves it into a
//! target at the moment it runs and hands it to the [`Deployer`].

use serde::Serialize;
use serde_json::json;

use crate::defaults::StagehandConfig;
use crate::deploy::{self, CompositeResult, Deployer, Prompt};
use crate::environment::Environment;
use crate::error::Result;
use crate::remote::Transport;
use crate::session::Selection;
use crate::task::Task;
use crate::tracking::DeploymentTracker;

/// Values given on the command line instead of at a prompt.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    pub author: Option<String>,
    pub note: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub dry_run: bool,
    pub results: Vec<CompositeResult>,
}

/// Walk the tasks the way [`Runner::run`] will, resolving every target
/// without touching a host. Missing selectors surface here, before any
/// transport or tracker is set up.
pub fn check_preconditions(config: &StagehandConfig, tasks: &[Task]) -> Result<()> {
    let mut selection = Selection::new();
    for task in tasks {
        match task {
            Task::Environment(env) => selection.select_environment(*env)?,
            Task::Branch(branch) => selection.select_branch(branch.clone())?,
            Task::List => {
                selection.require_environment(config, task.name())?;
            }
            _ => {
                selection.require_target(config, task.name())?;
            }
        }
    }
    Ok(())
}

pub struct Runner<'a> {
    config: &'a StagehandConfig,
    deployer: Deployer<'a>,
    prompt: &'a dyn Prompt,
    options: RunOptions,
}

impl<'a> Runner<'a> {
    pub fn new(
        config: &'a StagehandConfig,
        transport: &'a dyn Transport,
        tracker: &'a dyn DeploymentTracker,
        prompt: &'a dyn Prompt,
        options: RunOptions,
    ) -> Self {
        Self {
            config,
            deployer: Deployer::new(config, transport, tracker),
            prompt,
            options,
        }
    }

    pub fn run(&self, tasks: &[Task]) -> Result<RunReport> {
        check_preconditions(self.config, tasks)?;

        let mut selection = Selection::new();
        let mut results: Vec<CompositeResult> = Vec::new();

        for task in tasks {
            let outcome = self.run_task(task, &mut selection);
            match outcome {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(err) => {
                    let finished: Vec<&str> =
                        results.iter().map(|r| r.command.as_str()).collect();
                    return Err(err.with_detail("completedTasks", json!(finished)));
                }
            }
        }

        Ok(RunReport {
            environment: selection.environment(),
            branch: selection.branch().map(|b| b.to_string()),
            dry_run: self.options.dry_run,
            results,
        })
    }

    fn run_task(&self, task: &Task, selection: &mut Selection) -> Result<Option<CompositeResult>> {
        let command = task.name();
        let result = match task {
            Task::Environment(env) => {
                selection.select_environment(*env)?;
                log_status!("select", "environment {}", env);
                return Ok(None);
            }
            Task::Branch(branch) => {
                selection.select_branch(branch.clone())?;
                log_status!("select", "branch {}", branch);
                return Ok(None);
            }
            Task::List => {
                let target = selection.require_environment(self.config, command)?;
                self.deployer.list(&target)?
            }
            Task::Setup => {
                let target = selection.require_target(self.config, command)?;
                self.deployer.setup(&target)?
            }
            Task::Deploy => {
                let target = selection.require_target(self.config, command)?;
                let request = deploy::resolve_request(
                    &target.environment,
                    self.options.author.as_deref(),
                    self.options.note.as_deref(),
                    self.prompt,
                )?;
                self.deployer.deploy(&target, &request)?
            }
            Task::Rollback(commit) => {
                let target = selection.require_target(self.config, command)?;
                self.deployer.rollback(&target, commit)?
            }
            Task::Reboot => {
                let target = selection.require_target(self.config, command)?;
                self.deployer.reboot(&target)?
            }
            Task::Destroy => {
                let target = selection.require_target(self.config, command)?;
                self.deployer.destroy(&target)?
            }
        };
        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorCode};
    use crate::remote::testing::RecordingTransport;
    use crate::task::parse_tasks;
    use crate::tracking::NoopTracker;

    struct NoPrompt;

    impl Prompt for NoPrompt {
        fn ask(&self, field: &str, _message: &str) -> Result<String> {
            Err(Error::validation_invalid_argument(
                field,
                format!("No terminal to ask for the {}", field),
                None,
                None,
            ))
        }
    }

    fn run(
        config: &StagehandConfig,
        transport: &RecordingTransport,
        tasks: &[&str],
        options: RunOptions,
    ) -> Result<RunReport> {
        let tracker = NoopTracker;
        let runner = Runner::new(config, transport, &tracker, &NoPrompt, options);
        runner.run(&parse_tasks(tasks)?)
    }

    #[test]
    fn every_lifecycle_command_requires_an_environment() {
        let config = StagehandConfig::default();
        for task in ["setup", "deploy", "rollback:abc", "reboot", "list", "shiva_the_destroyer"] {
            let transport = RecordingTransport::new();
            let err = run(&config, &transport, &["stable", task], RunOptions::default()).unwrap_err();
            assert_eq!(err.code, ErrorCode::PreconditionEnvironmentMissing, "{}", task);
            assert!(transport.calls().is_empty());
        }
    }

    #[test]
    fn every_lifecycle_command_except_list_requires_a_branch() {
        let config = StagehandConfig::default();
        for task in ["setup", "deploy", "rollback:abc", "reboot", "shiva_the_destroyer"] {
            let transport = RecordingTransport::new();
            let err = run(&config, &transport, &["staging", task], RunOptions::default()).unwrap_err();
            assert_eq!(err.code, ErrorCode::PreconditionBranchMissing, "{}", task);
            assert!(transport.calls().is_empty());
        }
    }

    #[test]
    fn later_precondition_failure_stops_earlier_tasks() {
        let config = StagehandConfig::default();
        let transport = RecordingTransport::new();
        let err = run(
            &config,
            &transport,
            &["staging", "list", "setup"],
            RunOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::PreconditionBranchMissing);
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn list_needs_only_the_environment() {
        let config = StagehandConfig::default();
        let transport = RecordingTransport::new().respond("pm2 list", "table");
        let report = run(&config, &transport, &["staging", "list"], RunOptions::default()).unwrap();
        assert_eq!(report.environment, Some(Environment::Staging));
        assert_eq!(report.branch, None);
        assert_eq!(report.results.len(), 1);
        assert_eq!(
            transport.calls(),
            vec![("api.staging.internal".to_string(), "pm2 list".to_string())]
        );
    }

    #[test]
    fn second_environment_selector_is_rejected() {
        let config = StagehandConfig::default();
        let transport = RecordingTransport::new();
        let err = run(&config, &transport, &["staging", "production", "list"], RunOptions::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn deploy_without_author_and_no_terminal_fails_before_remote_work() {
        let config = StagehandConfig::default();
        let transport = RecordingTransport::new();
        let err = run(&config, &transport, &["integration", "master", "deploy"], RunOptions::default())
            .unwrap_err();
        assert_eq!(err.details["field"], "author");
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn tasks_run_in_order_and_report_completed_ones() {
        let config = StagehandConfig::default();
        let transport = RecordingTransport::new().fail_on("git clone", 128);
        let err = run(
            &config,
            &transport,
            &["integration", "master", "reboot", "setup"],
            RunOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
        assert_eq!(err.details["completedTasks"], json!(["reboot"]));
        assert_eq!(err.details["failedStep"], "clone");
    }

    #[test]
    fn deploy_with_flags_records_and_reboots() {
        let config = StagehandConfig::default();
        let transport = RecordingTransport::new().respond("rev-parse", "abc1234");
        let options = RunOptions {
            author: Some("ana".to_string()),
            note: Some("fixed a bug".to_string()),
            dry_run: false,
        };
        let report = run(&config, &transport, &["production", "stable", "deploy"], options).unwrap();

        let result = &report.results[0];
        assert_eq!(result.command, "deploy");
        assert_eq!(result.commit.as_deref(), Some("abc1234"));
        assert_eq!(result.hosts.len(), 2);
        let tracking = result.tracking.as_ref().unwrap();
        assert_eq!(tracking.note.as_deref(), Some("fixed a bug"));
    }
}
