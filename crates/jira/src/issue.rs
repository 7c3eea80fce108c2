//! Search response shapes.
//!
//! Custom field ids differ per Jira instance, so `fields` is decoded as a raw
//! JSON map and the three custom values are picked out by the ids in
//! [`CustomFieldIds`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use reconcile::{TicketRecord, Timestamp};

/// Text field holding the GitHub issue URL.
pub const DEFAULT_ISSUE_LINK_FIELD: &str = "customfield_10089";
/// User picker holding the solution engineer.
pub const DEFAULT_ENGINEER_FIELD: &str = "customfield_10582";
/// Number field holding the annual contract value.
pub const DEFAULT_ACV_FIELD: &str = "customfield_10134";

const STANDARD_FIELDS: [&str; 4] = ["summary", "status", "created", "parent"];

/// Instance-specific custom field ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFieldIds {
    pub issue_link: String,
    pub engineer: String,
    pub acv: String,
}

impl Default for CustomFieldIds {
    fn default() -> Self {
        Self {
            issue_link: DEFAULT_ISSUE_LINK_FIELD.into(),
            engineer: DEFAULT_ENGINEER_FIELD.into(),
            acv: DEFAULT_ACV_FIELD.into(),
        }
    }
}

impl CustomFieldIds {
    /// Every field the search must return.
    pub fn request_list(&self) -> Vec<&str> {
        STANDARD_FIELDS
            .iter()
            .copied()
            .chain([
                self.issue_link.as_str(),
                self.engineer.as_str(),
                self.acv.as_str(),
            ])
            .collect()
    }
}

/// Parses Jira's `2024-03-01T10:00:00.000+0000` timestamps, falling back to
/// RFC 3339.
pub fn parse_jira_time(value: &str) -> Option<Timestamp> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .ok()
        .map(|dt| Timestamp::from_utc(dt.with_timezone(&Utc)))
        .or_else(|| Timestamp::parse_rfc3339(value))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchPage {
    #[serde(default)]
    pub start_at: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawIssue {
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl RawIssue {
    fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub(crate) fn into_ticket(self, base_url: &str, ids: &CustomFieldIds) -> TicketRecord {
        let summary = self
            .field("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = self
            .field("status")
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let epic = self
            .field("parent")
            .and_then(|p| p.pointer("/fields/summary"))
            .and_then(non_empty);
        let engineer = self
            .field(&ids.engineer)
            .and_then(|u| u.get("displayName"))
            .and_then(non_empty);
        let created_at = self
            .field("created")
            .and_then(Value::as_str)
            .and_then(parse_jira_time);
        let acv = self.field(&ids.acv).and_then(Value::as_f64);
        let issue_link = self.field(&ids.issue_link).and_then(non_empty);

        TicketRecord {
            url: format!("{base_url}/browse/{}", self.key),
            key: self.key,
            summary,
            status,
            epic,
            engineer,
            created_at,
            acv,
            issue_link,
        }
    }
}
