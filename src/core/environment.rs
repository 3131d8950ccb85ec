//! Deployment environments and branch selectors.
//!
//! Environment selectors are closed: each one resolves to a fixed set of
//! settings (hosts, note policy, container capability, monitoring id) built
//! into the binary and overridable through `stagehand.json`. Branch selectors
//! are open: `branch:<name>` accepts any ref verbatim.

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Integration,
    Staging,
    Tertiary,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Production,
        Environment::Integration,
        Environment::Staging,
        Environment::Tertiary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Integration => "integration",
            Environment::Staging => "staging",
            Environment::Tertiary => "tertiary",
        }
    }

    pub fn from_selector(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|env| env.as_str() == name)
    }

    /// Settings compiled into the binary for this environment.
    pub fn builtin_settings(&self) -> EnvironmentSettings {
        match self {
            Environment::Production => EnvironmentSettings {
                hosts: vec![
                    "api-1.production.internal".to_string(),
                    "api-2.production.internal".to_string(),
                ],
                require_note: true,
                dockerized: false,
                monitoring_application_id: "3115416".to_string(),
                settings_name: None,
            },
            Environment::Integration => EnvironmentSettings {
                hosts: vec!["api.integration.internal".to_string()],
                require_note: false,
                dockerized: false,
                monitoring_application_id: "3115421".to_string(),
                settings_name: None,
            },
            Environment::Staging => EnvironmentSettings {
                hosts: vec!["api.staging.internal".to_string()],
                require_note: false,
                dockerized: false,
                monitoring_application_id: "3115433".to_string(),
                settings_name: None,
            },
            Environment::Tertiary => EnvironmentSettings {
                hosts: vec!["api.tertiary.internal".to_string()],
                require_note: false,
                dockerized: true,
                monitoring_application_id: "3115440".to_string(),
                settings_name: None,
            },
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSettings {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub require_note: bool,
    /// Services run in containers; reboot stops containers instead of the supervisor.
    #[serde(default)]
    pub dockerized: bool,
    #[serde(default)]
    pub monitoring_application_id: String,
    /// Value exported as the deployment settings name. Defaults to the environment name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_name: Option<String>,
}

impl EnvironmentSettings {
    pub fn settings_name(&self, environment: Environment) -> String {
        self.settings_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| environment.as_str().to_string())
    }
}

/// Git ref selected for checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    Stable,
    Master,
    Named(String),
}

impl Branch {
    pub const PREFIX: &'static str = "branch:";

    /// Arbitrary ref, taken verbatim. Empty names and names git would read as
    /// an option are rejected.
    pub fn named(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::validation_invalid_argument(
                "branch",
                "Branch name after 'branch:' cannot be empty",
                None,
                Some(vec!["branch:feature-x".to_string()]),
            ));
        }
        if name.starts_with('-') {
            return Err(Error::validation_invalid_argument(
                "branch",
                "Branch name cannot start with '-'",
                Some(name.to_string()),
                None,
            ));
        }
        Ok(Branch::Named(name.to_string()))
    }

    /// Parse `stable`, `master` or `branch:<name>`. Returns `None` for other tasks.
    pub fn from_selector(task: &str) -> Option<Result<Self>> {
        match task {
            "stable" => Some(Ok(Branch::Stable)),
            "master" => Some(Ok(Branch::Master)),
            _ => task.strip_prefix(Self::PREFIX).map(Self::named),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Branch::Stable => "stable",
            Branch::Master => "master",
            Branch::Named(name) => name,
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Branch {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_selectors_round_trip() {
        for env in Environment::ALL {
            assert_eq!(Environment::from_selector(env.as_str()), Some(env));
        }
        assert_eq!(Environment::from_selector("prod"), None);
    }

    #[test]
    fn builtin_settings_have_hosts() {
        for env in Environment::ALL {
            assert!(!env.builtin_settings().hosts.is_empty(), "{}", env);
        }
    }

    #[test]
    fn only_production_requires_a_note() {
        assert!(Environment::Production.builtin_settings().require_note);
        assert!(!Environment::Integration.builtin_settings().require_note);
        assert!(!Environment::Staging.builtin_settings().require_note);
    }

    #[test]
    fn settings_name_defaults_to_environment() {
        let settings = Environment::Staging.builtin_settings();
        assert_eq!(settings.settings_name(Environment::Staging), "staging");

        let custom = EnvironmentSettings {
            settings_name: Some("staging-eu".to_string()),
            ..settings
        };
        assert_eq!(custom.settings_name(Environment::Staging), "staging-eu");
    }

    #[test]
    fn branch_selectors() {
        assert_eq!(Branch::from_selector("stable").unwrap().unwrap(), Branch::Stable);
        assert_eq!(Branch::from_selector("master").unwrap().unwrap(), Branch::Master);
        assert_eq!(
            Branch::from_selector("branch:feature/x-1").unwrap().unwrap(),
            Branch::Named("feature/x-1".to_string())
        );
        assert!(Branch::from_selector("deploy").is_none());
    }

    #[test]
    fn named_branch_is_verbatim() {
        let branch = Branch::named("  odd;name ").unwrap();
        assert_eq!(branch.name(), "  odd;name ");
    }

    #[test]
    fn option_like_branch_is_rejected() {
        let err = Branch::from_selector("branch:--orphan").unwrap().unwrap_err();
        assert_eq!(err.details["id"], "--orphan");
    }

    #[test]
    fn empty_named_branch_is_rejected() {
        let err = Branch::from_selector("branch:").unwrap().unwrap_err();
        assert!(err.code.is_validation());
    }

    #[test]
    fn branch_serializes_as_name() {
        let json = serde_json::to_string(&Branch::Named("hotfix".to_string())).unwrap();
        assert_eq!(json, "\"hotfix\"");
    }
}
