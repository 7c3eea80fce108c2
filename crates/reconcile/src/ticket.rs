//! Tracker tickets mirrored onto the board.
//!
//! A [`TicketRecord`] is a Jira issue that links to a GitHub issue. The board
//! item for the GitHub issue carries the ticket's key, link, title, status,
//! epic, engineer, age and the issue number, plus the ACV when the ticket has
//! one.

use serde::{Deserialize, Serialize};

use crate::{BoardMetadata, FieldUpdate, FieldValue, Timestamp, ValueKind};

/// Board fields written for a ticket, in write order.
pub const TICKET_FIELDS: [(&str, ValueKind); 9] = [
    ("KEY", ValueKind::Text),
    ("JIRA", ValueKind::Text),
    ("Title (JIRA)", ValueKind::Text),
    ("Status (JIRA)", ValueKind::Text),
    ("EPIC", ValueKind::Text),
    ("SE", ValueKind::Text),
    ("Age (days)", ValueKind::Number),
    ("#", ValueKind::Number),
    ("ACV", ValueKind::Number),
];

/// One tracker ticket, flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Ticket key, e.g. `SUP-1234`.
    pub key: String,
    /// Browser link to the ticket.
    pub url: String,
    pub summary: String,
    /// Workflow status name.
    pub status: String,
    /// Summary of the parent epic.
    pub epic: Option<String>,
    /// Display name of the assigned solution engineer.
    pub engineer: Option<String>,
    pub created_at: Option<Timestamp>,
    /// Annual contract value.
    pub acv: Option<f64>,
    /// URL of the GitHub issue the ticket tracks.
    pub issue_link: Option<String>,
}

impl TicketRecord {
    /// Whole days since the ticket was created, if known.
    pub fn age_days(&self, now: Timestamp) -> Option<i64> {
        self.created_at.map(|created| created.whole_days_until(now))
    }
}

/// Builds the field writes for the board item tracking `issue_number`.
///
/// A missing epic or engineer is written as empty text. Age is omitted when
/// the creation time is unknown, ACV when the ticket has none. ACV is written
/// in whole units.
pub fn ticket_updates(
    board: &BoardMetadata,
    ticket: &TicketRecord,
    issue_number: u64,
    now: Timestamp,
) -> Vec<FieldUpdate> {
    let values = [
        Some(FieldValue::text(ticket.key.as_str())),
        Some(FieldValue::text(ticket.url.as_str())),
        Some(FieldValue::text(ticket.summary.as_str())),
        Some(FieldValue::text(ticket.status.as_str())),
        Some(FieldValue::text(ticket.epic.clone().unwrap_or_default())),
        Some(FieldValue::text(ticket.engineer.clone().unwrap_or_default())),
        ticket.age_days(now).map(FieldValue::from),
        Some(FieldValue::from(issue_number)),
        ticket.acv.map(|acv| FieldValue::from(acv.trunc())),
    ];

    TICKET_FIELDS
        .iter()
        .zip(values)
        .filter_map(|((name, kind), value)| {
            value.map(|value| FieldUpdate {
                field: board.descriptor(name, *kind),
                value,
            })
        })
        .collect()
}
