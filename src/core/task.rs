//! Task names as typed on the command line.

use std::str::FromStr;

use crate::environment::{Branch, Environment};
use crate::error::{Error, Result};
use crate::utils::validation;

const ROLLBACK_PREFIX: &str = "rollback:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Environment(Environment),
    Branch(Branch),
    Setup,
    Deploy,
    Rollback(String),
    Reboot,
    List,
    Destroy,
}

impl Task {
    /// Name used in logs and precondition errors.
    pub fn name(&self) -> &str {
        match self {
            Task::Environment(env) => env.as_str(),
            Task::Branch(branch) => branch.name(),
            Task::Setup => "setup",
            Task::Deploy => "deploy",
            Task::Rollback(_) => "rollback",
            Task::Reboot => "reboot",
            Task::List => "list",
            Task::Destroy => "shiva_the_destroyer",
        }
    }

    pub fn is_selector(&self) -> bool {
        matches!(self, Task::Environment(_) | Task::Branch(_))
    }

    fn known() -> Vec<String> {
        let mut known: Vec<String> = Environment::ALL
            .iter()
            .map(|env| env.as_str().to_string())
            .collect();
        known.extend(
            [
                "stable",
                "master",
                "branch:<name>",
                "setup",
                "deploy",
                "rollback:<commit>",
                "reboot",
                "list",
                "shiva_the_destroyer",
            ]
            .map(str::to_string),
        );
        known
    }
}

impl FromStr for Task {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(env) = Environment::from_selector(s) {
            return Ok(Task::Environment(env));
        }
        if let Some(branch) = Branch::from_selector(s) {
            return branch.map(Task::Branch);
        }
        if let Some(commit) = s.strip_prefix(ROLLBACK_PREFIX) {
            let commit = validation::require_non_empty(
                commit,
                "task",
                "Commit after 'rollback:' cannot be empty",
            )?;
            if commit.starts_with('-') {
                return Err(Error::validation_invalid_argument(
                    "task",
                    "Commit after 'rollback:' cannot start with '-'",
                    Some(s.to_string()),
                    Some(vec!["rollback:abc1234".to_string()]),
                ));
            }
            return Ok(Task::Rollback(commit.to_string()));
        }

        match s {
            "setup" => Ok(Task::Setup),
            "deploy" => Ok(Task::Deploy),
            "reboot" => Ok(Task::Reboot),
            "list" => Ok(Task::List),
            "shiva_the_destroyer" => Ok(Task::Destroy),
            "rollback" => Err(Error::validation_invalid_argument(
                "task",
                "Rollback needs a commit",
                Some(s.to_string()),
                Some(vec!["rollback:abc1234".to_string()]),
            )),
            other => Err(Error::validation_invalid_argument(
                "task",
                format!("Unknown task '{}'", other),
                Some(other.to_string()),
                Some(Task::known()),
            )),
        }
    }
}

/// Parse every task up front so a typo fails before anything runs.
pub fn parse_tasks<S: AsRef<str>>(names: &[S]) -> Result<Vec<Task>> {
    if names.is_empty() {
        return Err(Error::validation_missing_argument(vec!["task".to_string()]));
    }
    names.iter().map(|name| name.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn parses_selectors_and_commands() {
        let tasks = parse_tasks(&["integration", "branch:feature-x", "rollback:abcdef1"]).unwrap();
        assert_eq!(
            tasks,
            vec![
                Task::Environment(Environment::Integration),
                Task::Branch(Branch::Named("feature-x".to_string())),
                Task::Rollback("abcdef1".to_string()),
            ]
        );
        assert_eq!(
            "shiva_the_destroyer".parse::<Task>().unwrap(),
            Task::Destroy
        );
    }

    #[test]
    fn unknown_task_lists_known_ones() {
        let err = parse_tasks(&["production", "stable", "deploi"]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
        assert_eq!(err.details["id"], "deploi");
        assert!(err.details["tried"]
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t == "deploy"));
    }

    #[test]
    fn rollback_requires_a_commit() {
        assert!("rollback:".parse::<Task>().is_err());
        assert!("rollback".parse::<Task>().is_err());
    }

    #[test]
    fn rollback_commit_cannot_look_like_an_option() {
        let err = "rollback:--merge".parse::<Task>().unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
        assert_eq!(err.details["id"], "rollback:--merge");
    }

    #[test]
    fn empty_branch_name_is_rejected() {
        assert!("branch:".parse::<Task>().unwrap_err().code.is_validation());
    }

    #[test]
    fn no_tasks_is_a_missing_argument() {
        let err = parse_tasks::<&str>(&[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
    }
}
