//! Module contract and registry
//!
//! A module is a pluggable unit that declares log queries for a polling window,
//! decides whether an event concerns it, and renders a detail fragment for the
//! events it claims. The email dispatcher is itself a module that owns a
//! registry of detail modules.

pub mod registry;

pub use registry::ModuleRegistry;

use crate::error::ModuleError;
use crate::events::{Event, Timestamp};
use serde::{Deserialize, Serialize};

/// Trait for implementing processing modules driven through a run
///
/// A run calls `begin` once on every module, then `process` for each event,
/// then `end` once. `process` returns `ModuleError::NotApplicable` when the
/// event does not pertain to the module.
pub trait Module: Send + Sync {
    /// Stable unique name, used as the registry key
    fn name(&self) -> &str;

    /// Query descriptors for the polling window `[start, end)`
    ///
    /// An empty result means the module relies on the shared query.
    fn filter(&self, start: Timestamp, end: Timestamp) -> Vec<QueryDescriptor>;

    /// Acquire run-scoped resources such as compiled templates
    fn begin(&mut self) -> Result<(), ModuleError>;

    /// Render a detail fragment for an event this module claims
    fn process(&self, event: &Event) -> Result<String, ModuleError>;

    /// Release run-scoped resources
    fn end(&mut self) -> Result<(), ModuleError>;
}

/// Log query for the external query collaborator, in `FilterLogEvents` shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_group_name: Option<String>,
    pub filter_pattern: String,
    /// Window start in milliseconds since the Unix epoch (inclusive)
    pub start_time: i64,
    /// Window end in milliseconds since the Unix epoch (exclusive)
    pub end_time: i64,
}

impl QueryDescriptor {
    pub fn new(filter_pattern: impl Into<String>, start: Timestamp, end: Timestamp) -> Self {
        Self {
            log_group_name: None,
            filter_pattern: filter_pattern.into(),
            start_time: start.timestamp_millis(),
            end_time: end.timestamp_millis(),
        }
    }

    pub fn with_log_group(mut self, log_group_name: impl Into<String>) -> Self {
        self.log_group_name = Some(log_group_name.into());
        self
    }

    /// Filter pattern matching a single CloudTrail event name
    pub fn event_name_pattern(event_name: &str) -> String {
        format!("{{ $.eventName = \"{}\" }}", event_name)
    }
}

/// Query descriptors declared by one module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleQueries {
    pub module: String,
    pub queries: Vec<QueryDescriptor>,
}

/// Case-insensitive set of module names that must never be registered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisabledModules {
    names: Vec<String>,
}

impl DisabledModules {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// Parse a comma-separated list such as `email.login, other`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.names.iter().any(|n| *n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_disabled_modules_case_insensitive() {
        let disabled = DisabledModules::parse("Email.Login, other ,,");
        assert!(disabled.contains("email.login"));
        assert!(disabled.contains("EMAIL.LOGIN"));
        assert!(disabled.contains("OTHER"));
        assert!(!disabled.contains("email"));
        assert!(!disabled.contains(""));
    }

    #[test]
    fn test_disabled_modules_empty_list() {
        let disabled = DisabledModules::parse("");
        assert!(disabled.is_empty());
        assert!(!disabled.contains("email"));
    }

    #[test]
    fn test_query_descriptor_window() {
        let start = Utc.with_ymd_and_hms(2020, 3, 10, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 3, 10, 12, 5, 0).unwrap();
        let query = QueryDescriptor::new(
            QueryDescriptor::event_name_pattern("ConsoleLogin"),
            start,
            end,
        )
        .with_log_group("CloudTrail/DefaultLogGroup");

        assert_eq!(query.filter_pattern, "{ $.eventName = \"ConsoleLogin\" }");
        assert_eq!(query.end_time - query.start_time, 300_000);

        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["logGroupName"], "CloudTrail/DefaultLogGroup");
        assert_eq!(json["startTime"], start.timestamp_millis());
    }
}
