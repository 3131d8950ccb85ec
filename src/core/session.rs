//! Per-invocation selection state.
//!
//! Selectors only fill in a [`Selection`]. Commands then resolve it into an
//! immutable target: [`EnvironmentTarget`] for commands that only need hosts,
//! [`DeployTarget`] for everything that touches the checkout. Resolution is
//! where missing selectors turn into precondition errors.

use serde::Serialize;

use crate::defaults::StagehandConfig;
use crate::environment::{Branch, Environment, EnvironmentSettings};
use crate::error::{Error, Result};

#[derive(Debug, Default, Clone)]
pub struct Selection {
    environment: Option<Environment>,
    branch: Option<Branch>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_environment(&mut self, environment: Environment) -> Result<()> {
        if let Some(existing) = self.environment {
            return Err(Error::validation_invalid_argument(
                "environment",
                format!(
                    "Environment already selected ({}); cannot also select {}",
                    existing, environment
                ),
                None,
                None,
            ));
        }
        self.environment = Some(environment);
        Ok(())
    }

    pub fn select_branch(&mut self, branch: Branch) -> Result<()> {
        if let Some(existing) = &self.branch {
            return Err(Error::validation_invalid_argument(
                "branch",
                format!(
                    "Branch already selected ({}); cannot also select {}",
                    existing, branch
                ),
                None,
                None,
            ));
        }
        self.branch = Some(branch);
        Ok(())
    }

    pub fn environment(&self) -> Option<Environment> {
        self.environment
    }

    pub fn branch(&self) -> Option<&Branch> {
        self.branch.as_ref()
    }

    /// Resolve the environment alone. Used by commands that never read the branch.
    pub fn require_environment(
        &self,
        config: &StagehandConfig,
        command: &str,
    ) -> Result<EnvironmentTarget> {
        let environment = self
            .environment
            .ok_or_else(|| Error::precondition_environment_missing(command))?;
        EnvironmentTarget::resolve(config, environment)
    }

    /// Resolve environment and branch. The environment is checked first.
    pub fn require_target(&self, config: &StagehandConfig, command: &str) -> Result<DeployTarget> {
        let environment = self.require_environment(config, command)?;
        let branch = self
            .branch
            .clone()
            .ok_or_else(|| Error::precondition_branch_missing(command))?;
        Ok(DeployTarget {
            environment,
            branch,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentTarget {
    pub environment: Environment,
    pub settings: EnvironmentSettings,
}

impl EnvironmentTarget {
    pub fn resolve(config: &StagehandConfig, environment: Environment) -> Result<Self> {
        let settings = config.environment(environment).clone();
        if settings.hosts.iter().all(|host| host.trim().is_empty()) {
            return Err(Error::config_invalid_value(
                format!("environments.{}.hosts", environment),
                None,
                "Environment has no hosts configured",
            ));
        }
        Ok(Self {
            environment,
            settings,
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.settings.hosts
    }

    pub fn settings_name(&self) -> String {
        self.settings.settings_name(self.environment)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployTarget {
    #[serde(flatten)]
    pub environment: EnvironmentTarget,
    pub branch: Branch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn empty_selection_fails_on_environment_first() {
        let config = StagehandConfig::default();
        let err = Selection::new().require_target(&config, "deploy").unwrap_err();
        assert_eq!(err.code, ErrorCode::PreconditionEnvironmentMissing);
    }

    #[test]
    fn missing_branch_is_a_precondition_error() {
        let config = StagehandConfig::default();
        let mut selection = Selection::new();
        selection.select_environment(Environment::Staging).unwrap();

        let err = selection.require_target(&config, "setup").unwrap_err();
        assert_eq!(err.code, ErrorCode::PreconditionBranchMissing);
    }

    #[test]
    fn environment_alone_is_enough_for_require_environment() {
        let config = StagehandConfig::default();
        let mut selection = Selection::new();
        selection.select_environment(Environment::Staging).unwrap();

        let target = selection.require_environment(&config, "list").unwrap();
        assert_eq!(target.environment, Environment::Staging);
        assert_eq!(target.hosts(), config.environments.staging.hosts.as_slice());
    }

    #[test]
    fn full_selection_resolves() {
        let config = StagehandConfig::default();
        let mut selection = Selection::new();
        selection.select_environment(Environment::Production).unwrap();
        selection.select_branch(Branch::Stable).unwrap();

        let target = selection.require_target(&config, "deploy").unwrap();
        assert_eq!(target.branch, Branch::Stable);
        assert!(target.environment.settings.require_note);
        assert_eq!(target.environment.settings_name(), "production");
    }

    #[test]
    fn second_selection_is_rejected() {
        let mut selection = Selection::new();
        selection.select_environment(Environment::Production).unwrap();
        assert!(selection.select_environment(Environment::Staging).is_err());

        selection.select_branch(Branch::Master).unwrap();
        assert!(selection.select_branch(Branch::Stable).is_err());
        assert_eq!(selection.environment(), Some(Environment::Production));
        assert_eq!(selection.branch(), Some(&Branch::Master));
    }

    #[test]
    fn environment_without_hosts_is_a_config_error() {
        let mut config = StagehandConfig::default();
        config.environments.integration.hosts.clear();

        let err = EnvironmentTarget::resolve(&config, Environment::Integration).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }
}
