use clap::Args;
use serde::Serialize;

use stagehand::defaults::{self, StagehandConfig};
use stagehand::deploy::Prompt;
use stagehand::remote::{DryRunTransport, Transport};
use stagehand::runner::{self, RunOptions, RunReport, Runner};
use stagehand::ssh::{SshSettings, SshTransport};
use stagehand::task::{self, Task};
use stagehand::tracking::{self, DeploymentTracker, NoopTracker, TrackingBackend};
use stagehand::Error;

use super::CmdResult;

#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Tasks, run left to right: an environment, a branch, then commands
    /// (e.g. `production stable deploy`, `integration branch:fix rollback:abc1234`)
    #[arg(required = true, value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Deploy author (skips the prompt)
    #[arg(long)]
    pub author: Option<String>,

    /// Release note (skips the prompt; still validated)
    #[arg(long)]
    pub note: Option<String>,

    /// Tracking backend for this run: git-log, monitoring or none
    #[arg(long, value_parser = parse_tracker)]
    pub tracker: Option<TrackingBackend>,

    /// Print remote commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_tracker(value: &str) -> Result<TrackingBackend, String> {
    value.parse().map_err(|e: Error| e.message)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksOutput {
    pub command: String,
    pub tasks: Vec<String>,
    pub tracker: TrackingBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(flatten)]
    pub report: RunReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned_commands: Vec<String>,
}

/// Prompts on the terminal, or fails naming the flag that avoids the prompt.
struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&self, field: &str, message: &str) -> stagehand::Result<String> {
        if !crate::tty::is_stdin_tty() {
            return Err(Error::validation_invalid_argument(
                field,
                format!("No terminal to ask for the {}; pass --{}", field, field),
                None,
                None,
            ));
        }
        crate::tty::prompt(message)
    }
}

pub fn run(args: TaskArgs) -> CmdResult<TasksOutput> {
    let config = defaults::load_config()?;
    run_with_config(args, &config)
}

fn run_with_config(args: TaskArgs, config: &StagehandConfig) -> CmdResult<TasksOutput> {
    let tasks = task::parse_tasks(&args.tasks)?;
    runner::check_preconditions(config, &tasks)?;

    let tracker: Box<dyn DeploymentTracker> = if tasks.contains(&Task::Deploy) {
        tracking::build_tracker(config, args.tracker, args.dry_run)?
    } else {
        Box::new(NoopTracker)
    };

    let dry_run = DryRunTransport::new();
    let ssh;
    let transport: &dyn Transport = if args.dry_run || tasks.iter().all(Task::is_selector) {
        &dry_run
    } else {
        ssh = SshTransport::new(SshSettings::from_config(config)?);
        &ssh
    };

    let options = RunOptions {
        author: args.author,
        note: args.note,
        dry_run: args.dry_run,
    };
    let runner = Runner::new(config, transport, tracker.as_ref(), &TerminalPrompt, options);
    let report = runner.run(&tasks)?;

    Ok((
        TasksOutput {
            command: "tasks".to_string(),
            tasks: args.tasks,
            tracker: tracker.backend(),
            config_path: defaults::config_path().ok(),
            report,
            planned_commands: if args.dry_run {
                dry_run.commands()
            } else {
                Vec::new()
            },
        },
        0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand::ErrorCode;

    fn args(tasks: &[&str]) -> TaskArgs {
        TaskArgs {
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
            author: Some("ana".to_string()),
            note: Some("fixed a bug".to_string()),
            tracker: None,
            dry_run: false,
        }
    }

    /// Neither a tracker nor an SSH transport can be built from this config.
    fn unusable_config() -> StagehandConfig {
        let mut config = StagehandConfig {
            identity_file: Some("/definitely/not/here/id_rsa".to_string()),
            ..StagehandConfig::default()
        };
        config.tracking.backend = TrackingBackend::GitLog;
        config.tracking.repository = None;
        config
    }

    #[test]
    fn missing_selectors_are_reported_before_tracker_or_ssh_setup() {
        let config = unusable_config();

        let err = run_with_config(args(&["deploy"]), &config).err().unwrap();
        assert_eq!(err.code, ErrorCode::PreconditionEnvironmentMissing);

        let err = run_with_config(args(&["production", "deploy"]), &config)
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::PreconditionBranchMissing);

        let err = run_with_config(args(&["staging", "setup"]), &config)
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::PreconditionBranchMissing);
    }

    #[test]
    fn configuration_is_checked_once_selectors_are_complete() {
        let config = unusable_config();

        let err = run_with_config(args(&["production", "stable", "deploy"]), &config)
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::ConfigMissingKey);

        let err = run_with_config(args(&["production", "stable", "reboot"]), &config)
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::SshIdentityFileNotFound);
    }

    #[test]
    fn dry_run_reports_the_tracker_that_would_record() {
        let mut dry = args(&["integration", "master", "deploy"]);
        dry.dry_run = true;
        let (output, exit_code) = run_with_config(dry, &unusable_config()).unwrap();
        assert_eq!(exit_code, 0);
        assert_eq!(output.tracker, TrackingBackend::GitLog);
        assert!(output
            .planned_commands
            .iter()
            .any(|c| c.contains("git fetch --all")));
    }

    #[test]
    fn tracker_flag_accepts_known_backends() {
        assert_eq!(parse_tracker("git-log"), Ok(TrackingBackend::GitLog));
        assert_eq!(parse_tracker("none"), Ok(TrackingBackend::None));
        assert!(parse_tracker("webhook")
            .unwrap_err()
            .contains("Unknown tracking backend"));
    }
}
