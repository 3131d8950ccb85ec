use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::environment::{Environment, EnvironmentSettings};
use crate::error::{Error, Result};
use crate::paths;
use crate::tracking::TrackingBackend;

/// Root configuration structure for stagehand.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagehandConfig {
    /// Remote login user
    #[serde(default = "default_user")]
    pub user: String,

    /// Let `ssh` read the operator's ~/.ssh/config
    #[serde(default = "default_use_host_config")]
    pub use_host_config: bool,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default)]
    pub identity_file: Option<String>,

    /// Git URL of the deployed service
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Checkout location on the remote host, relative to the login directory
    #[serde(default = "default_checkout_path")]
    pub checkout_path: String,

    /// Project name written to tracking records
    #[serde(default = "default_project")]
    pub project: String,

    #[serde(default)]
    pub process: ProcessConfig,

    #[serde(default)]
    pub environments: EnvironmentsConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl Default for StagehandConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            use_host_config: default_use_host_config(),
            port: default_ssh_port(),
            identity_file: None,
            repository: default_repository(),
            checkout_path: default_checkout_path(),
            project: default_project(),
            process: ProcessConfig::default(),
            environments: EnvironmentsConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl StagehandConfig {
    pub fn environment(&self, environment: Environment) -> &EnvironmentSettings {
        match environment {
            Environment::Production => &self.environments.production,
            Environment::Integration => &self.environments.integration,
            Environment::Staging => &self.environments.staging,
            Environment::Tertiary => &self.environments.tertiary,
        }
    }
}

/// How the service is started under the process supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConfig {
    #[serde(default = "default_process_name")]
    pub name: String,

    #[serde(default = "default_main")]
    pub main: String,

    /// Worker instances for the main process
    #[serde(default = "default_instances")]
    pub instances: u32,

    #[serde(default = "default_maintenance_script")]
    pub maintenance_script: String,

    /// Variable carrying the deployment settings name
    #[serde(default = "default_settings_env")]
    pub settings_env: String,

    /// NODE_PATH for booted processes
    #[serde(default = "default_module_path")]
    pub module_path: String,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            name: default_process_name(),
            main: default_main(),
            instances: default_instances(),
            maintenance_script: default_maintenance_script(),
            settings_env: default_settings_env(),
            module_path: default_module_path(),
        }
    }
}

impl ProcessConfig {
    pub fn maintenance_name(&self) -> String {
        format!("{}-maintenance", self.name)
    }
}

/// Per-environment settings. An entry present in the file replaces the built-in one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentsConfig {
    #[serde(default = "default_production")]
    pub production: EnvironmentSettings,
    #[serde(default = "default_integration")]
    pub integration: EnvironmentSettings,
    #[serde(default = "default_staging")]
    pub staging: EnvironmentSettings,
    #[serde(default = "default_tertiary")]
    pub tertiary: EnvironmentSettings,
}

impl Default for EnvironmentsConfig {
    fn default() -> Self {
        Self {
            production: default_production(),
            integration: default_integration(),
            staging: default_staging(),
            tertiary: default_tertiary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingConfig {
    #[serde(default)]
    pub backend: TrackingBackend,

    /// Git URL of the tracking repository (git-log backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default = "default_monitoring_endpoint")]
    pub monitoring_endpoint: String,

    /// Bearer credential for the monitoring endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            backend: TrackingBackend::default(),
            repository: None,
            monitoring_endpoint: default_monitoring_endpoint(),
            api_key: None,
        }
    }
}

pub const MONITORING_API_KEY_ENV: &str = "STAGEHAND_MONITORING_API_KEY";

impl TrackingConfig {
    /// API key from the config file, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(MONITORING_API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_user() -> String {
    "ubuntu".to_string()
}

fn default_use_host_config() -> bool {
    true
}

fn default_ssh_port() -> u16 {
    22
}

fn default_repository() -> String {
    "git@github.com:CodeNow/api.git".to_string()
}

fn default_checkout_path() -> String {
    "api".to_string()
}

fn default_project() -> String {
    "api".to_string()
}

fn default_process_name() -> String {
    "api".to_string()
}

fn default_main() -> String {
    "server.js".to_string()
}

fn default_instances() -> u32 {
    10
}

fn default_maintenance_script() -> String {
    "lib/cleanup.js".to_string()
}

fn default_settings_env() -> String {
    "NODE_ENV".to_string()
}

fn default_module_path() -> String {
    "lib".to_string()
}

fn default_production() -> EnvironmentSettings {
    Environment::Production.builtin_settings()
}

fn default_integration() -> EnvironmentSettings {
    Environment::Integration.builtin_settings()
}

fn default_staging() -> EnvironmentSettings {
    Environment::Staging.builtin_settings()
}

fn default_tertiary() -> EnvironmentSettings {
    Environment::Tertiary.builtin_settings()
}

fn default_monitoring_endpoint() -> String {
    "https://api.newrelic.com/deployments.xml".to_string()
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load stagehand.json, or built-in defaults when the file does not exist.
pub fn load_config() -> Result<StagehandConfig> {
    let path = paths::stagehand_json()?;
    load_config_from(&path)
}

/// Load a config file from an explicit path.
/// A missing file yields built-in defaults; unreadable or invalid JSON is an error.
pub fn load_config_from(path: &Path) -> Result<StagehandConfig> {
    if !path.exists() {
        return Ok(StagehandConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Get the path to stagehand.json (for display purposes)
pub fn config_path() -> Result<String> {
    Ok(paths::stagehand_json()?.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn missing_file_yields_builtin_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("stagehand.json")).unwrap();
        assert_eq!(config.process.instances, 10);
        assert_eq!(config.checkout_path, "api");
        assert_eq!(
            config.environment(Environment::Production),
            &Environment::Production.builtin_settings()
        );
    }

    #[test]
    fn file_overrides_individual_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stagehand.json");
        fs::write(
            &path,
            r#"{
                "user": "deploy",
                "process": { "instances": 4 },
                "environments": {
                    "staging": { "hosts": ["10.0.0.5"], "dockerized": true }
                },
                "tracking": { "backend": "git-log", "repository": "git@example.com:ops/deploys.git" }
            }"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.user, "deploy");
        assert_eq!(config.process.instances, 4);
        assert_eq!(config.process.name, "api");
        assert_eq!(config.environments.staging.hosts, vec!["10.0.0.5"]);
        assert!(config.environments.staging.dockerized);
        assert_eq!(
            config.environments.production,
            Environment::Production.builtin_settings()
        );
        assert_eq!(config.tracking.backend, TrackingBackend::GitLog);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stagehand.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidJson);
    }

    #[test]
    fn api_key_from_config_wins() {
        let tracking = TrackingConfig {
            api_key: Some("from-file".to_string()),
            ..TrackingConfig::default()
        };
        assert_eq!(tracking.resolve_api_key().as_deref(), Some("from-file"));
    }

    #[test]
    fn maintenance_name_derives_from_process_name() {
        assert_eq!(ProcessConfig::default().maintenance_name(), "api-maintenance");
    }
}
