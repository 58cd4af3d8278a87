use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored endpoint as listed by the target registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Target {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self { id: id.into(), url: url.into(), active: true }
    }
}

/// Result of a single probe attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// URL that was probed
    pub url: String,

    /// HTTP status code, 0 when no response was received
    #[serde(rename = "status")]
    pub status_code: u16,

    /// True iff a response arrived with a status code below 400
    #[serde(default)]
    pub success: bool,

    /// Wall-clock time from issuing the request to completion or failure
    pub response_time_ms: i64,

    /// When the probe was issued
    pub timestamp: DateTime<Utc>,

    /// Transport error text, empty when a response was received
    #[serde(rename = "error", default)]
    pub error_message: String,
}

impl CheckResult {
    /// Build the result for a probe that received an HTTP response.
    pub fn from_response(
        url: impl Into<String>,
        status_code: u16,
        response_time_ms: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            status_code,
            success: status_code < 400,
            response_time_ms,
            timestamp,
            error_message: String::new(),
        }
    }

    /// Build the result for a probe that failed at the transport level.
    pub fn from_failure(
        url: impl Into<String>,
        error: impl Into<String>,
        response_time_ms: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut error_message = error.into();
        if error_message.is_empty() {
            error_message = "request failed".to_string();
        }
        Self {
            url: url.into(),
            status_code: 0,
            success: false,
            response_time_ms,
            timestamp,
            error_message,
        }
    }

    /// Up/down classification used by alerting.
    ///
    /// Only an exact 200 counts as up, which is stricter than `success`: a 301 or 204 is a
    /// successful probe but a down target for alerting purposes.
    pub fn is_up(&self) -> bool {
        self.status_code == 200
    }

    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }

    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(raw: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Last known alerting state of a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    pub is_up: bool,
    #[serde(rename = "last_alert")]
    pub last_alert_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_success_threshold() {
        assert!(CheckResult::from_response("https://a.test", 200, 10, ts()).success);
        assert!(CheckResult::from_response("https://a.test", 301, 10, ts()).success);
        assert!(CheckResult::from_response("https://a.test", 399, 10, ts()).success);
        assert!(!CheckResult::from_response("https://a.test", 400, 10, ts()).success);
        assert!(!CheckResult::from_response("https://a.test", 503, 10, ts()).success);
    }

    #[test]
    fn test_is_up_requires_exact_200() {
        assert!(CheckResult::from_response("https://a.test", 200, 10, ts()).is_up());
        let redirect = CheckResult::from_response("https://a.test", 301, 10, ts());
        assert!(redirect.success);
        assert!(!redirect.is_up());
    }

    #[test]
    fn test_failure_always_carries_error() {
        let result = CheckResult::from_failure("https://a.test", "", 5000, ts());
        assert_eq!(result.status_code, 0);
        assert!(!result.success);
        assert!(result.has_error());
    }

    #[test]
    fn test_wire_field_names() {
        let result = CheckResult::from_failure("https://a.test", "connection refused", 12, ts());
        let value: serde_json::Value = serde_json::from_slice(&result.to_json().unwrap()).unwrap();

        assert_eq!(value["url"], "https://a.test");
        assert_eq!(value["status"], 0);
        assert_eq!(value["success"], false);
        assert_eq!(value["response_time_ms"], 12);
        assert_eq!(value["error"], "connection refused");
        assert_eq!(value["timestamp"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_decode_consumer_subset() {
        let raw = br#"{"url":"https://a.test","status":200,"response_time_ms":42,"timestamp":"2024-05-01T12:00:00Z"}"#;
        let result = CheckResult::from_json(raw).unwrap();

        assert_eq!(result.status_code, 200);
        assert!(!result.success);
        assert!(result.error_message.is_empty());
        assert!(result.is_up());
    }

    #[test]
    fn test_target_active_defaults_to_true() {
        let target: Target = serde_json::from_str(r#"{"id":"1","url":"https://a.test"}"#).unwrap();
        assert!(target.active);
    }

    #[test]
    fn test_target_state_json() {
        let state = TargetState { is_up: true, last_alert_at: ts() };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"is_up":true,"last_alert":"2024-05-01T12:00:00Z"}"#);
    }
}
