//! Normalized source records and their timeline events.
//!
//! Feeds translate whatever the source system returns into [`ItemRecord`]s.
//! The classifier and the field registry only ever see these types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ContentNodeId, Timestamp};

/// Label that marks an item as waiting on its author.
pub const WAITING_RESPONSE_LABEL: &str = "waiting-response";

/// Milestone that marks an item as blocked.
pub const BLOCKED_MILESTONE: &str = "Blocked";

/// What kind of content a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A repository issue.
    Issue,
    /// A pull request.
    PullRequest,
}

/// Aggregate review decision on a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    /// The pull request has the approvals it needs.
    Approved,
    /// A reviewer requested changes.
    ChangesRequested,
    /// A review is required before merging.
    ReviewRequired,
}

impl ReviewDecision {
    /// Parses the GraphQL enum value. Empty or unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "APPROVED" => Some(ReviewDecision::Approved),
            "CHANGES_REQUESTED" => Some(ReviewDecision::ChangesRequested),
            "REVIEW_REQUIRED" => Some(ReviewDecision::ReviewRequired),
            _ => None,
        }
    }
}

/// Lifecycle state of the source item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Open.
    Open,
    /// Closed without merging.
    Closed,
    /// Merged pull request.
    Merged,
    /// The source reported no state at all.
    ///
    /// Indistinguishable from "no data yet".
    Unknown,
    /// A state this engine does not recognise.
    Other(String),
}

impl LifecycleState {
    /// Parses a state string case-insensitively. The empty string is
    /// [`LifecycleState::Unknown`].
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return LifecycleState::Unknown;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "open" => LifecycleState::Open,
            "closed" => LifecycleState::Closed,
            "merged" => LifecycleState::Merged,
            _ => LifecycleState::Other(trimmed.to_string()),
        }
    }

    /// Closed and merged items are both closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, LifecycleState::Closed | LifecycleState::Merged)
    }

    /// Returns `true` while the item is open.
    pub fn is_open(&self) -> bool {
        matches!(self, LifecycleState::Open)
    }
}

/// The normalized view of one source issue or pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Issue or pull request.
    pub kind: ItemKind,
    /// Node id of the content; the key for board membership.
    pub content_id: ContentNodeId,
    /// Issue or pull request number.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Login of the author.
    pub author: String,
    /// Logins of the assignees.
    pub assignees: Vec<String>,
    /// Aggregate review decision, when the source reports one.
    pub review_decision: Option<ReviewDecision>,
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Title of the attached milestone.
    pub milestone: Option<String>,
    /// Draft pull request.
    pub draft: bool,
    /// Names of the attached labels.
    pub labels: BTreeSet<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Closure time, when closed.
    pub closed_at: Option<Timestamp>,
    /// Total comments on the item.
    pub comment_count: u64,
    /// Reviews that approved, requested changes, or were dismissed.
    pub review_count: u64,
    /// Comments attached to the counted reviews.
    pub review_comment_count: u64,
    /// Counted reviews whose author is in the configured reviewer list.
    pub filtered_review_count: u64,
    /// Comments attached to the filtered reviews.
    pub filtered_review_comment_count: u64,
}

impl ItemRecord {
    /// Returns `true` if the record carries the label.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// The kind of a historical lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A label was added.
    Labeled,
    /// A label was removed.
    Unlabeled,
    /// A milestone was attached.
    Milestoned,
    /// A milestone was removed.
    Demilestoned,
    /// Any other event.
    Other(String),
}

/// One entry in an item's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// What happened.
    pub kind: EventKind,
    /// Label involved, for label events.
    pub label: Option<String>,
    /// Milestone title involved, for milestone events.
    pub milestone: Option<String>,
    /// When it happened.
    pub created_at: Timestamp,
}

impl EventRecord {
    /// Returns `true` if this event ended a waiting condition: the
    /// `waiting-response` label was removed, or the `Blocked` milestone was.
    pub fn ends_wait(&self) -> bool {
        let removed_waiting_label = self.kind == EventKind::Unlabeled
            && self.label.as_deref() == Some(WAITING_RESPONSE_LABEL);
        let removed_blocked_milestone =
            matches!(self.kind, EventKind::Unlabeled | EventKind::Demilestoned)
                && self.milestone.as_deref() == Some(BLOCKED_MILESTONE);
        removed_waiting_label || removed_blocked_milestone
    }
}
