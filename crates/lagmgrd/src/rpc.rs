//! Wire messages of the `Net.LagManagement` service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LagError;
use crate::types::LagInfo;

/// Service name used as the route prefix.
pub const SERVICE_NAME: &str = "Net.LagManagement";

/// Operation status carried in every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LagStatus {
    #[serde(rename = "OK")]
    Ok,
    AlreadyExists,
    NotFound,
    AlreadyMember,
    InvalidArgument,
    Busy,
    Internal,
}

impl LagStatus {
    /// Returns the status name as it appears on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LagStatus::Ok => "OK",
            LagStatus::AlreadyExists => "AlreadyExists",
            LagStatus::NotFound => "NotFound",
            LagStatus::AlreadyMember => "AlreadyMember",
            LagStatus::InvalidArgument => "InvalidArgument",
            LagStatus::Busy => "Busy",
            LagStatus::Internal => "Internal",
        }
    }
}

impl fmt::Display for LagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member port reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
}

impl Member {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

fn member_ids(members: &[Member]) -> Vec<String> {
    members.iter().map(|m| m.id.clone()).collect()
}

/// CreateLag request. Both fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLagRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lag_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Member>,
}

impl CreateLagRequest {
    pub fn member_ids(&self) -> Vec<String> {
        member_ids(&self.members)
    }
}

/// DeleteLag and GetLag request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagIdRequest {
    pub lag_id: String,
}

/// AddLagMember and RemoveLagMember request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagMembersRequest {
    pub lag_id: String,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl LagMembersRequest {
    pub fn member_ids(&self) -> Vec<String> {
        member_ids(&self.members)
    }
}

/// LAG description returned by GetLag and ListLags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagEntry {
    pub lag_id: String,
    pub members: Vec<Member>,
    pub created_at: DateTime<Utc>,
}

impl From<LagInfo> for LagEntry {
    fn from(info: LagInfo) -> Self {
        Self {
            lag_id: info.id.into(),
            members: info.members.into_iter().map(Member::new).collect(),
            created_at: info.created_at,
        }
    }
}

/// Response body of every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagResponse {
    pub status: LagStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lag_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lag: Option<LagEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lags: Option<Vec<LagEntry>>,
}

impl LagResponse {
    /// Plain success.
    pub fn ok() -> Self {
        Self {
            status: LagStatus::Ok,
            lag_id: None,
            message: None,
            lag: None,
            lags: None,
        }
    }

    /// Success confirming a LAG id.
    pub fn with_lag_id(mut self, lag_id: impl Into<String>) -> Self {
        self.lag_id = Some(lag_id.into());
        self
    }

    /// Success carrying one LAG.
    pub fn with_lag(mut self, info: LagInfo) -> Self {
        self.lag_id = Some(info.id.to_string());
        self.lag = Some(info.into());
        self
    }

    /// Success carrying a LAG list.
    pub fn with_lags(mut self, infos: Vec<LagInfo>) -> Self {
        self.lags = Some(infos.into_iter().map(LagEntry::from).collect());
        self
    }
}

impl From<&LagError> for LagResponse {
    fn from(err: &LagError) -> Self {
        Self {
            status: err.status(),
            lag_id: None,
            message: Some(err.to_string()),
            lag: None,
            lags: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&LagStatus::Ok).unwrap(), "\"OK\"");
        assert_eq!(
            serde_json::to_string(&LagStatus::AlreadyMember).unwrap(),
            "\"AlreadyMember\""
        );
        let status: LagStatus = serde_json::from_str("\"Busy\"").unwrap();
        assert_eq!(status, LagStatus::Busy);
        assert_eq!(LagStatus::InvalidArgument.to_string(), "InvalidArgument");
    }

    #[test]
    fn test_create_request_optional_fields() {
        let req: CreateLagRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, CreateLagRequest::default());

        let req: CreateLagRequest = serde_json::from_str(
            r#"{"lag_id":"PortChannel1","members":[{"id":"Ethernet0"},{"id":"Ethernet4"}]}"#,
        )
        .unwrap();
        assert_eq!(req.lag_id.as_deref(), Some("PortChannel1"));
        assert_eq!(req.member_ids(), vec!["Ethernet0", "Ethernet4"]);
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let json = serde_json::to_value(LagResponse::ok().with_lag_id("PortChannel1")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "OK", "lag_id": "PortChannel1"})
        );
    }

    #[test]
    fn test_response_from_error() {
        let result = LagResponse::from(&LagError::already_exists("PortChannel1"));
        assert_eq!(result.status, LagStatus::AlreadyExists);
        assert_eq!(
            result.message.as_deref(),
            Some("LAG 'PortChannel1' already exists")
        );
    }
}
