use reqwest::blocking::Client;

use super::{DeploymentTracker, TrackingBackend, TrackingRecord};
use crate::error::{Error, Result, TrackingRequestFailedDetails};

/// Posts each deploy to the monitoring service's deployment endpoint.
pub struct MonitoringTracker {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl MonitoringTracker {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
        }
    }
}

/// Form body for the deployment endpoint.
pub(crate) fn form_fields(record: &TrackingRecord) -> Vec<(&'static str, String)> {
    vec![
        ("deployment[application_id]", record.application_id.clone()),
        ("deployment[description]", record.branch.clone()),
        ("deployment[revision]", record.commit.clone()),
        (
            "deployment[changelog]",
            record.note.clone().unwrap_or_default(),
        ),
        ("deployment[user]", record.author.clone()),
    ]
}

fn request_failed(error: impl Into<String>, status: Option<u16>) -> Error {
    Error::tracking_request_failed(TrackingRequestFailedDetails {
        backend: TrackingBackend::Monitoring.as_str().to_string(),
        error: error.into(),
        status,
    })
}

impl DeploymentTracker for MonitoringTracker {
    fn backend(&self) -> TrackingBackend {
        TrackingBackend::Monitoring
    }

    fn record(&self, record: &TrackingRecord) -> Result<()> {
        if record.application_id.is_empty() {
            return Err(Error::config_missing_key(
                format!("environments.{}.monitoringApplicationId", record.environment),
                None,
            ));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .form(&form_fields(record))
            .send()
            .map_err(|e| request_failed(e.to_string(), None))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(request_failed(
                format!("HTTP {}: {}", status.as_u16(), body.trim()),
                Some(status.as_u16()),
            ));
        }

        log_status!(
            "track",
            "Monitoring notified of {}@{} (application {})",
            record.branch,
            record.commit,
            record.application_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::error::ErrorCode;

    fn record(application_id: &str) -> TrackingRecord {
        TrackingRecord {
            environment: Environment::Production,
            branch: "stable".to_string(),
            commit: "abc1234".to_string(),
            timestamp: "2026-03-01T10:00:00Z".to_string(),
            project: "api".to_string(),
            author: "ana".to_string(),
            note: Some("fixed a bug".to_string()),
            application_id: application_id.to_string(),
        }
    }

    #[test]
    fn form_fields_map_record() {
        let fields = form_fields(&record("42"));
        assert_eq!(
            fields,
            vec![
                ("deployment[application_id]", "42".to_string()),
                ("deployment[description]", "stable".to_string()),
                ("deployment[revision]", "abc1234".to_string()),
                ("deployment[changelog]", "fixed a bug".to_string()),
                ("deployment[user]", "ana".to_string()),
            ]
        );
    }

    #[test]
    fn missing_application_id_fails_before_any_request() {
        let tracker = MonitoringTracker::new("http://127.0.0.1:9".to_string(), "key".to_string());
        let err = tracker.record(&record("")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigMissingKey);
    }

    #[test]
    fn unreachable_endpoint_is_a_tracking_failure() {
        // Port 9 (discard) is closed on test machines; the connection is refused.
        let tracker = MonitoringTracker::new("http://127.0.0.1:9/".to_string(), "key".to_string());
        let err = tracker.record(&record("42")).unwrap_err();
        assert_eq!(err.code, ErrorCode::TrackingRequestFailed);
        assert_eq!(err.details["backend"], "monitoring");
    }
}
