//! Audit event types for CloudTrail records delivered through CloudWatch Logs
//!
//! Events are decoded once and then only ever borrowed by modules. Optional
//! scalars stay `Option<String>` so a module can tell an absent field from an
//! empty one.

use crate::error::DecodeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Opaque JSON object carried through without interpretation
pub type JsonObject = Map<String, Value>;

/// A single CloudTrail audit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Event {
    #[serde(rename = "eventVersion", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "eventTime", default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Event name, used as the dispatch key by detail modules
    #[serde(rename = "eventName")]
    pub name: String,
    #[serde(rename = "eventSource", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "awsRegion", default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "sourceIPAddress", default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(rename = "userAgent", default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(rename = "userIdentity", default, skip_serializing_if = "Option::is_none")]
    pub user_identity: Option<UserIdentity>,
    /// Raw request parameters, never parsed further
    #[serde(rename = "requestParameters", default, skip_serializing_if = "Option::is_none")]
    pub request_parameters: Option<Value>,
    #[serde(rename = "responseElements", default, skip_serializing_if = "Option::is_none")]
    pub response_elements: Option<JsonObject>,
    #[serde(rename = "requestID", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "readOnly", default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<JsonObject>>,
    #[serde(rename = "eventType", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(rename = "recipientAccountId", default, skip_serializing_if = "Option::is_none")]
    pub recipient_account_id: Option<String>,
    #[serde(rename = "sharedEventID", default, skip_serializing_if = "Option::is_none")]
    pub shared_event_id: Option<String>,
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

/// Identity of the principal that made the request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserIdentity {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    #[serde(rename = "principalId", default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(rename = "accountId", default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(rename = "accessKeyId", default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(rename = "sessionContext", default, skip_serializing_if = "Option::is_none")]
    pub session_context: Option<SessionContext>,
}

/// Session details for requests made with temporary credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionContext {
    #[serde(rename = "sessionIssuer", default, skip_serializing_if = "Option::is_none")]
    pub session_issuer: Option<SessionIssuer>,
    #[serde(rename = "webIdFederationData", default, skip_serializing_if = "Option::is_none")]
    pub web_id_federation_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<SessionAttributes>,
}

/// Entity that issued the session credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionIssuer {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub issuer_type: Option<String>,
    #[serde(rename = "principalId", default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(rename = "accountId", default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// Session attributes; the MFA flag arrives as the string "true" or "false"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionAttributes {
    #[serde(rename = "mfaAuthenticated", default, skip_serializing_if = "Option::is_none")]
    pub mfa_authenticated: Option<String>,
    #[serde(rename = "creationDate", default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
}

impl Event {
    /// Decode a single log event message into an `Event`
    ///
    /// Unknown fields are ignored. A missing `eventName` or malformed JSON is
    /// reported as a `DecodeError`.
    pub fn from_json(message: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(message)?)
    }

    /// Event identifier for error context, `<unknown>` when absent
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("<unknown>")
    }

    /// Parse `eventTime` as an RFC 3339 timestamp
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// MFA flag from the session attributes, if the event carries one
    pub fn mfa_authenticated(&self) -> Option<&str> {
        self.user_identity
            .as_ref()?
            .session_context
            .as_ref()?
            .attributes
            .as_ref()?
            .mfa_authenticated
            .as_deref()
    }
}

/// One entry of a CloudWatch Logs subscription payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    #[serde(default)]
    pub id: String,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: i64,
    pub message: String,
}

/// Decompressed CloudWatch Logs subscription payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogsPayload {
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub log_group: String,
    #[serde(default)]
    pub log_stream: String,
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    #[serde(default)]
    pub log_events: Vec<LogEvent>,
}

impl LogsPayload {
    pub fn from_json(data: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Decode every log event message, one result per entry
    pub fn events(&self) -> Vec<Result<Event, DecodeError>> {
        self.log_events
            .iter()
            .map(|entry| Event::from_json(&entry.message))
            .collect()
    }
}

/// Decode events from a payload object, a JSON array of events, or JSON lines
///
/// A malformed entry only fails that entry. Input that is neither an object,
/// an array, nor line-delimited JSON yields one decode failure per line.
pub fn decode_events(data: &str) -> Vec<Result<Event, DecodeError>> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[') {
        return match serde_json::from_str::<Vec<Value>>(trimmed) {
            Ok(values) => values
                .into_iter()
                .map(|v| serde_json::from_value(v).map_err(DecodeError::from))
                .collect(),
            Err(e) => vec![Err(e.into())],
        };
    }

    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
        if obj.contains_key("logEvents") {
            return match serde_json::from_value::<LogsPayload>(Value::Object(obj)) {
                Ok(payload) => payload.events(),
                Err(e) => vec![Err(e.into())],
            };
        }
        return vec![serde_json::from_value(Value::Object(obj)).map_err(DecodeError::from)];
    }

    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(Event::from_json)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONSOLE_LOGIN: &str = r#"{
        "eventVersion": "1.05",
        "userIdentity": {
            "type": "IAMUser",
            "principalId": "AIDAEXAMPLE",
            "arn": "arn:aws:iam::123456789012:user/alice",
            "accountId": "123456789012",
            "userName": "alice",
            "sessionContext": {
                "sessionIssuer": {"type": "Role", "userName": "admin"},
                "attributes": {"mfaAuthenticated": "true", "creationDate": "2020-03-10T12:00:00Z"}
            }
        },
        "eventTime": "2020-03-10T12:34:56Z",
        "eventSource": "signin.amazonaws.com",
        "eventName": "ConsoleLogin",
        "awsRegion": "us-east-1",
        "sourceIPAddress": "192.0.2.10",
        "userAgent": "Mozilla/5.0",
        "requestParameters": null,
        "responseElements": {"ConsoleLogin": "Success"},
        "additionalEventData": {"MFAUsed": "Yes"},
        "eventID": "3fcfb586-5b4d-4a1c-9d47-9e2b5d1f0a11",
        "eventType": "AwsConsoleSignIn",
        "recipientAccountId": "123456789012"
    }"#;

    #[test]
    fn test_decode_console_login() {
        let event = Event::from_json(CONSOLE_LOGIN).unwrap();
        assert_eq!(event.name, "ConsoleLogin");
        assert_eq!(event.event_type.as_deref(), Some("AwsConsoleSignIn"));
        assert_eq!(event.id(), "3fcfb586-5b4d-4a1c-9d47-9e2b5d1f0a11");
        assert_eq!(event.region.as_deref(), Some("us-east-1"));

        let identity = event.user_identity.as_ref().unwrap();
        assert_eq!(identity.user_name.as_deref(), Some("alice"));
        assert_eq!(identity.access_key_id, None);
        assert_eq!(event.mfa_authenticated(), Some("true"));

        let issuer = identity
            .session_context
            .as_ref()
            .and_then(|ctx| ctx.session_issuer.as_ref())
            .unwrap();
        assert_eq!(issuer.issuer_type.as_deref(), Some("Role"));

        let response = event.response_elements.as_ref().unwrap();
        assert_eq!(response.get("ConsoleLogin"), Some(&Value::from("Success")));
    }

    #[test]
    fn test_absent_vs_empty_fields() {
        let absent = Event::from_json(r#"{"eventName": "ConsoleLogin"}"#).unwrap();
        assert!(absent.user_identity.is_none());
        assert!(absent.event_type.is_none());

        let empty =
            Event::from_json(r#"{"eventName": "ConsoleLogin", "eventType": "", "userIdentity": {}}"#)
                .unwrap();
        assert_eq!(empty.event_type.as_deref(), Some(""));
        let identity = empty.user_identity.unwrap();
        assert!(identity.session_context.is_none());
        assert_eq!(identity, UserIdentity::default());
    }

    #[test]
    fn test_missing_event_name_is_decode_error() {
        let result = Event::from_json(r#"{"eventType": "AwsApiCall"}"#);
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        assert!(Event::from_json(r#"{"eventName": "#).is_err());
        assert!(Event::from_json("").is_err());
        assert!(Event::from_json("[]").is_err());
    }

    #[test]
    fn test_event_timestamp() {
        let event = Event::from_json(CONSOLE_LOGIN).unwrap();
        let ts = event.timestamp().unwrap();
        assert_eq!(ts.to_rfc3339(), "2020-03-10T12:34:56+00:00");

        let no_time = Event {
            name: "x".to_string(),
            time: Some("yesterday".to_string()),
            ..Default::default()
        };
        assert!(no_time.timestamp().is_none());
    }

    #[test]
    fn test_unknown_event_id() {
        let event = Event {
            name: "ConsoleLogin".to_string(),
            ..Default::default()
        };
        assert_eq!(event.id(), "<unknown>");
    }

    #[test]
    fn test_serialization_uses_wire_names() {
        let event = Event::from_json(CONSOLE_LOGIN).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventName"], "ConsoleLogin");
        assert_eq!(value["userIdentity"]["userName"], "alice");
        assert!(value.get("sharedEventID").is_none());
        assert!(value.get("additionalEventData").is_none());
    }

    #[test]
    fn test_logs_payload_events() {
        let payload = serde_json::json!({
            "messageType": "DATA_MESSAGE",
            "owner": "123456789012",
            "logGroup": "CloudTrail/DefaultLogGroup",
            "logStream": "123456789012_CloudTrail_us-east-1",
            "subscriptionFilters": ["notify"],
            "logEvents": [
                {"id": "1", "timestamp": 1583843696000i64, "message": "{\"eventName\":\"ConsoleLogin\"}"},
                {"id": "2", "timestamp": 1583843697000i64, "message": "{\"eventName\":"},
                {"id": "3", "timestamp": 1583843698000i64, "message": "{\"eventName\":\"CreateUser\"}"}
            ]
        })
        .to_string();

        let payload = LogsPayload::from_json(&payload).unwrap();
        assert_eq!(payload.log_group, "CloudTrail/DefaultLogGroup");

        let events = payload.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].as_ref().unwrap().name, "ConsoleLogin");
        assert!(events[1].is_err());
        assert_eq!(events[2].as_ref().unwrap().name, "CreateUser");
    }

    #[test]
    fn test_decode_events_formats() {
        let lines = "{\"eventName\":\"A\"}\n\n{\"eventName\":\"B\"}\nnot json\n";
        let decoded = decode_events(lines);
        assert_eq!(decoded.len(), 3);
        assert!(decoded[2].is_err());

        let array = r#"[{"eventName":"A"},{"eventType":"missing name"}]"#;
        let decoded = decode_events(array);
        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].is_ok());
        assert!(decoded[1].is_err());

        let single = r#"{"eventName":"ConsoleLogin","eventID":"e1"}"#;
        let decoded = decode_events(single);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap().id(), "e1");

        assert!(decode_events("   \n").is_empty());
    }
}
