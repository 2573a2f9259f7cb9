//! Run report collection and persistence
//!
//! Each invocation gathers its outcome (session identity, tool listing,
//! errors) into a [`RunReport`] that is written to disk as pretty-printed
//! JSON. The report is saved on success, on failure, and on interrupt, so a
//! run always leaves a record behind.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

/// Outcome record of one connection run, serialized camelCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Name of the deployment contacted.
    pub deployment: String,
    /// Base URL of the service.
    pub service_url: String,
    /// Session details, present once the handshake succeeded.
    pub session: Option<SessionReport>,
    /// Tool descriptors returned by the server.
    pub tools: Vec<serde_json::Value>,
    /// Errors encountered during the run.
    pub errors: Vec<ErrorReport>,
}

/// Session details recorded after a successful handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    /// The opaque session identifier.
    pub id: String,
    /// Always `true` in a recorded session; kept for report readability.
    pub connected: bool,
    /// When the handshake completed.
    pub connected_at: DateTime<Utc>,
}

/// One recorded error with its occurrence time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
    /// Human-readable error message.
    pub message: String,
}

impl RunReport {
    /// Starts an empty report for the given deployment.
    pub fn new(deployment: &str, service_url: &Url) -> Self {
        Self {
            timestamp: Utc::now(),
            deployment: deployment.to_string(),
            service_url: service_url.to_string(),
            session: None,
            tools: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Records a successful handshake.
    pub fn record_session(&mut self, session_id: &str) {
        self.session = Some(SessionReport {
            id: session_id.to_string(),
            connected: true,
            connected_at: Utc::now(),
        });
    }

    /// Records the tool listing returned by the server.
    pub fn record_tools(&mut self, tools: &[serde_json::Value]) {
        self.tools = tools.to_vec();
    }

    /// Appends an error with the current timestamp.
    pub fn record_error(&mut self, message: &str) {
        self.errors.push(ErrorReport {
            timestamp: Utc::now(),
            message: message.to_string(),
        });
    }

    /// Writes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::McplinkError::Io`] when the file cannot be
    /// written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_report() -> RunReport {
        RunReport::new(
            "chatgpt",
            &Url::parse("https://mcp.example.com/chatgpt").unwrap(),
        )
    }

    #[test]
    fn test_new_report_is_empty() {
        let report = make_report();
        assert!(report.session.is_none());
        assert!(report.tools.is_empty());
        assert!(report.errors.is_empty());
        assert_eq!(report.deployment, "chatgpt");
    }

    #[test]
    fn test_record_session_sets_connected() {
        let mut report = make_report();
        report.record_session("sess-123");
        let session = report.session.expect("session recorded");
        assert_eq!(session.id, "sess-123");
        assert!(session.connected);
    }

    #[test]
    fn test_record_error_appends_with_timestamp() {
        let mut report = make_report();
        report.record_error("first");
        report.record_error("second");
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].message, "first");
        assert_eq!(report.errors[1].message, "second");
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let mut report = make_report();
        report.record_session("abc");
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("serviceUrl").is_some(), "serviceUrl must be camelCase");
        assert!(value["session"].get("connectedAt").is_some());
        assert!(value.get("service_url").is_none());
    }

    #[test]
    fn test_save_writes_parseable_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("output-chatgpt.json");

        let mut report = make_report();
        report.record_tools(&[serde_json::json!({"name": "list_forms"})]);
        report.save(&path).expect("save");

        let contents = std::fs::read_to_string(&path).expect("read back");
        let value: serde_json::Value = serde_json::from_str(&contents).expect("valid JSON");
        assert_eq!(value["tools"][0]["name"], "list_forms");
        assert_eq!(value["deployment"], "chatgpt");
    }
}
