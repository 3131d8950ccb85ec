//! Deployment tracking.
//!
//! One [`TrackingRecord`] is produced per deploy, after the checkout and
//! before dependencies are installed. Where it goes depends on the backend:
//! an append-only log file in a git repository, or the monitoring service's
//! deployment endpoint.

mod git_log;
mod monitoring;

pub use git_log::GitLogTracker;
pub use monitoring::MonitoringTracker;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::defaults::StagehandConfig;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::paths;
use crate::session::DeployTarget;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackingBackend {
    GitLog,
    #[default]
    Monitoring,
    None,
}

impl TrackingBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingBackend::GitLog => "git-log",
            TrackingBackend::Monitoring => "monitoring",
            TrackingBackend::None => "none",
        }
    }
}

impl FromStr for TrackingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "git-log" => Ok(TrackingBackend::GitLog),
            "monitoring" => Ok(TrackingBackend::Monitoring),
            "none" => Ok(TrackingBackend::None),
            other => Err(Error::validation_invalid_argument(
                "tracker",
                format!("Unknown tracking backend '{}'", other),
                Some(other.to_string()),
                Some(vec![
                    "git-log".to_string(),
                    "monitoring".to_string(),
                    "none".to_string(),
                ]),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub environment: Environment,
    pub branch: String,
    pub commit: String,
    pub timestamp: String,
    pub project: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub application_id: String,
}

impl TrackingRecord {
    pub fn new(
        target: &DeployTarget,
        commit: &str,
        project: &str,
        author: &str,
        note: Option<&str>,
    ) -> Self {
        Self {
            environment: target.environment.environment,
            branch: target.branch.name().to_string(),
            commit: commit.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            project: project.to_string(),
            author: author.to_string(),
            note: note.map(str::to_string),
            application_id: target.environment.settings.monitoring_application_id.clone(),
        }
    }

    /// `branch;commit;timestamp;project;author;note`
    pub fn to_log_line(&self) -> String {
        [
            self.branch.as_str(),
            self.commit.as_str(),
            self.timestamp.as_str(),
            self.project.as_str(),
            self.author.as_str(),
            self.note.as_deref().unwrap_or(""),
        ]
        .join(";")
    }
}

pub trait DeploymentTracker {
    fn backend(&self) -> TrackingBackend;

    fn record(&self, record: &TrackingRecord) -> Result<()>;
}

/// Tracking switched off.
pub struct NoopTracker;

impl DeploymentTracker for NoopTracker {
    fn backend(&self) -> TrackingBackend {
        TrackingBackend::None
    }

    fn record(&self, record: &TrackingRecord) -> Result<()> {
        log_status!(
            "track",
            "Tracking disabled; not recording {}@{}",
            record.branch,
            record.commit
        );
        Ok(())
    }
}

/// Prints the record the configured backend would have received.
pub struct DryRunTracker {
    backend: TrackingBackend,
}

impl DeploymentTracker for DryRunTracker {
    fn backend(&self) -> TrackingBackend {
        self.backend
    }

    fn record(&self, record: &TrackingRecord) -> Result<()> {
        log_status!(
            "dry-run",
            "track via {}: {}",
            self.backend.as_str(),
            record.to_log_line()
        );
        Ok(())
    }
}

/// Build the tracker for this run. `backend` overrides the configured one.
pub fn build_tracker(
    config: &StagehandConfig,
    backend: Option<TrackingBackend>,
    dry_run: bool,
) -> Result<Box<dyn DeploymentTracker>> {
    let backend = backend.unwrap_or(config.tracking.backend);

    if dry_run {
        return Ok(Box::new(DryRunTracker { backend }));
    }

    match backend {
        TrackingBackend::None => Ok(Box::new(NoopTracker)),
        TrackingBackend::GitLog => {
            let repository = config
                .tracking
                .repository
                .clone()
                .filter(|url| !url.is_empty())
                .ok_or_else(|| {
                    Error::config_missing_key("tracking.repository", None)
                        .with_hint("Set tracking.repository in stagehand.json or pass --tracker none")
                })?;
            Ok(Box::new(GitLogTracker::new(
                repository,
                paths::tracking_checkout()?,
            )))
        }
        TrackingBackend::Monitoring => {
            let api_key = config.tracking.resolve_api_key().ok_or_else(|| {
                Error::config_missing_key("tracking.apiKey", None).with_hint(format!(
                    "Set tracking.apiKey in stagehand.json or export {}",
                    crate::defaults::MONITORING_API_KEY_ENV
                ))
            })?;
            Ok(Box::new(MonitoringTracker::new(
                config.tracking.monitoring_endpoint.clone(),
                api_key,
            )))
        }
    }
}
