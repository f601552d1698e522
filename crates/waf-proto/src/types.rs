//! Feed records shared by the dashboard topics and the REST snapshot API.
//!
//! Field names follow the backend's camelCase JSON.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Severity of a detected attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low severity.
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
    /// Critical severity.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Operational state reported by the WAF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WafState {
    /// Enforcing rules.
    Active,
    /// Not enforcing.
    #[default]
    Inactive,
    /// Faulted.
    Error,
    /// Under maintenance.
    Maintenance,
}

impl fmt::Display for WafState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
            Self::Maintenance => "maintenance",
        };
        f.write_str(s)
    }
}

/// A single attack observed (and usually blocked) by the WAF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackEvent {
    /// Event identifier assigned by the backend.
    pub id: String,
    /// Detection time as sent by the backend.
    pub timestamp: String,
    /// Client address.
    pub source_ip: String,
    /// Requested path.
    pub target_path: String,
    /// Attack classification (e.g. `sql_injection`).
    pub attack_type: String,
    /// Severity.
    pub severity: Severity,
    /// Whether the request was blocked.
    pub blocked: bool,
    /// Client user agent.
    #[serde(default)]
    pub user_agent: String,
    /// Offending payload excerpt.
    #[serde(default)]
    pub payload: String,
    /// Identifiers of the rules that matched.
    #[serde(default)]
    pub matched_rules: Vec<String>,
}

/// One traffic sample for the live chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSample {
    /// Sample time as sent by the backend.
    pub timestamp: String,
    /// Requests seen in the sample window.
    pub total_requests: u64,
    /// Requests blocked in the sample window.
    pub blocked_requests: u64,
    /// Requests allowed in the sample window.
    pub allowed_requests: u64,
    /// Average response time in milliseconds.
    pub response_time: f64,
}

/// Aggregate counters for the dashboard cards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Total requests.
    pub total_requests: u64,
    /// Blocked requests.
    pub blocked_requests: u64,
    /// Allowed requests.
    pub allowed_requests: u64,
    /// Blocked share, in percent.
    pub block_rate: f64,
    /// Average response time in milliseconds.
    pub avg_response_time: f64,
    /// Uptime in seconds.
    pub uptime: f64,
}

/// Full WAF status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusSnapshot {
    /// Operational state.
    pub status: WafState,
    /// WAF version string.
    pub version: String,
    /// Last restart time.
    pub last_restart: String,
    /// Last configuration change.
    pub config_last_updated: String,
    /// Number of loaded rules.
    pub rules_count: u32,
    /// Number of enabled rules.
    pub active_rules_count: u32,
}

impl StatusSnapshot {
    /// Shallow-merge a patch: every field present in the patch replaces
    /// the current value.
    pub fn merge(&mut self, patch: &StatusPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(version) = &patch.version {
            self.version.clone_from(version);
        }
        if let Some(last_restart) = &patch.last_restart {
            self.last_restart.clone_from(last_restart);
        }
        if let Some(updated) = &patch.config_last_updated {
            self.config_last_updated.clone_from(updated);
        }
        if let Some(count) = patch.rules_count {
            self.rules_count = count;
        }
        if let Some(count) = patch.active_rules_count {
            self.active_rules_count = count;
        }
    }
}

impl From<&StatusPatch> for StatusSnapshot {
    fn from(patch: &StatusPatch) -> Self {
        let mut snapshot = Self::default();
        snapshot.merge(patch);
        snapshot
    }
}

/// Partial status update pushed on the status topic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    /// Operational state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WafState>,
    /// WAF version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Last restart time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_restart: Option<String>,
    /// Last configuration change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_last_updated: Option<String>,
    /// Number of loaded rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_count: Option<u32>,
    /// Number of enabled rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_rules_count: Option<u32>,
}

impl From<StatusSnapshot> for StatusPatch {
    fn from(snapshot: StatusSnapshot) -> Self {
        Self {
            status: Some(snapshot.status),
            version: Some(snapshot.version),
            last_restart: Some(snapshot.last_restart),
            config_last_updated: Some(snapshot.config_last_updated),
            rules_count: Some(snapshot.rules_count),
            active_rules_count: Some(snapshot.active_rules_count),
        }
    }
}

/// Envelope used by the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload, present on success.
    pub data: Option<T>,
    /// Informational message.
    #[serde(default)]
    pub message: Option<String>,
    /// Error description.
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the envelope into its payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the call was unsuccessful or carried no data.
    pub fn into_data(self) -> Result<T, ProtoError> {
        if !self.success {
            let reason = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "request failed".to_string());
            return Err(ProtoError::Validation(reason));
        }
        self.data
            .ok_or_else(|| ProtoError::Decoding("response envelope has no data".to_string()))
    }
}

/// Encode a record as JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_record<T: Serialize + ?Sized>(record: &T) -> Result<String, ProtoError> {
    serde_json::to_string(record).map_err(|e| ProtoError::Encoding(e.to_string()))
}

/// Decode a record from a JSON frame body.
///
/// # Errors
///
/// Returns an error if the body is not valid JSON for `T`.
pub fn decode_record<T: DeserializeOwned>(body: &str) -> Result<T, ProtoError> {
    serde_json::from_str(body).map_err(|e| ProtoError::Decoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_attack() -> AttackEvent {
        AttackEvent {
            id: "atk-1".to_string(),
            timestamp: "2024-05-01T10:00:00Z".to_string(),
            source_ip: "203.0.113.9".to_string(),
            target_path: "/login".to_string(),
            attack_type: "sql_injection".to_string(),
            severity: Severity::High,
            blocked: true,
            user_agent: "curl/8.0".to_string(),
            payload: "' OR '1'='1".to_string(),
            matched_rules: vec!["942100".to_string()],
        }
    }

    #[test]
    fn test_attack_event_uses_camel_case() {
        let json = encode_record(&sample_attack()).expect("encode");
        assert!(json.contains("\"sourceIp\":\"203.0.113.9\""));
        assert!(json.contains("\"matchedRules\":[\"942100\"]"));
        assert!(json.contains("\"severity\":\"high\""));
    }

    #[test]
    fn test_attack_event_roundtrip_preserves_fields() {
        let attack = sample_attack();
        let decoded: AttackEvent =
            decode_record(&encode_record(&attack).expect("encode")).expect("decode");
        assert_eq!(decoded, attack);
    }

    #[test]
    fn test_attack_event_optional_fields_default() {
        let json = r#"{"id":"a","timestamp":"t","sourceIp":"1.2.3.4","targetPath":"/",
            "attackType":"xss","severity":"low","blocked":false}"#;
        let attack: AttackEvent = decode_record(json).expect("decode");
        assert!(attack.matched_rules.is_empty());
        assert!(attack.user_agent.is_empty());
    }

    #[test]
    fn test_decode_record_rejects_garbage() {
        let err = decode_record::<TrafficSample>("{not json").unwrap_err();
        assert!(matches!(err, ProtoError::Decoding(_)));
    }

    #[test]
    fn test_status_merge_is_shallow() {
        let mut status = StatusSnapshot {
            status: WafState::Active,
            version: "2.1.0".to_string(),
            last_restart: "yesterday".to_string(),
            config_last_updated: "today".to_string(),
            rules_count: 120,
            active_rules_count: 100,
        };
        let patch = StatusPatch {
            status: Some(WafState::Maintenance),
            active_rules_count: Some(90),
            ..StatusPatch::default()
        };

        status.merge(&patch);

        assert_eq!(status.status, WafState::Maintenance);
        assert_eq!(status.active_rules_count, 90);
        assert_eq!(status.version, "2.1.0");
        assert_eq!(status.rules_count, 120);
    }

    #[test]
    fn test_status_patch_from_partial_json() {
        let patch: StatusPatch = decode_record(r#"{"status":"error"}"#).expect("decode");
        assert_eq!(patch.status, Some(WafState::Error));
        assert!(patch.version.is_none());

        let adopted = StatusSnapshot::from(&patch);
        assert_eq!(adopted.status, WafState::Error);
        assert_eq!(adopted.rules_count, 0);
    }

    #[test]
    fn test_status_patch_skips_absent_fields() {
        let patch = StatusPatch {
            rules_count: Some(3),
            ..StatusPatch::default()
        };
        assert_eq!(encode_record(&patch).expect("encode"), r#"{"rulesCount":3}"#);
    }

    #[test]
    fn test_api_response_into_data() {
        let ok: ApiResponse<StatsSnapshot> = decode_record(
            r#"{"success":true,"data":{"totalRequests":10,"blockedRequests":2,
            "allowedRequests":8,"blockRate":20.0,"avgResponseTime":1.5,"uptime":99.0}}"#,
        )
        .expect("decode");
        let stats = ok.into_data().expect("data");
        assert_eq!(stats.blocked_requests, 2);

        let failed: ApiResponse<StatsSnapshot> =
            decode_record(r#"{"success":false,"error":"forbidden"}"#).expect("decode");
        let err = failed.into_data().unwrap_err();
        assert_eq!(err.to_string(), "validation error: forbidden");
    }

    #[test]
    fn test_display_impls() {
        assert_eq!(Severity::Critical.to_string(), "critical");
        assert_eq!(WafState::Maintenance.to_string(), "maintenance");
    }
}
