//! Status classification.
//!
//! A record's status is decided by an ordered decision table. Rules are
//! evaluated top to bottom and the first whose predicate holds assigns the
//! label; nothing after it is looked at.
//!
//! | # | Guard | Label |
//! |---|---|---|
//! | 1 | review decision is `APPROVED` | Approved |
//! | 2 | closed or merged | Closed |
//! | 3 | milestone is `Blocked` | Blocked |
//! | 4 | draft | In Progress |
//! | 5 | lifecycle state unknown | In Progress |
//! | 6 | has the `waiting-response` label | Waiting for Response |
//! | - | otherwise | Waiting for Review |
//!
//! Only the fall-through case needs the event timeline, and only then is it
//! fetched.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    BoardMetadata, EventRecord, EventTimeline, ItemRecord, LifecycleState, ReviewDecision,
    SyncError, Timestamp, BLOCKED_MILESTONE, WAITING_RESPONSE_LABEL,
};

/// The discrete status assigned to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusLabel {
    /// Reviewers approved the change.
    Approved,
    /// Closed or merged.
    Closed,
    /// Parked on the `Blocked` milestone.
    Blocked,
    /// Draft, or the source has no state for it yet.
    InProgress,
    /// Waiting on the author.
    WaitingForResponse,
    /// Waiting on a reviewer.
    WaitingForReview,
}

impl StatusLabel {
    /// Every label, in decision-table order.
    pub const ALL: [StatusLabel; 6] = [
        StatusLabel::Approved,
        StatusLabel::Closed,
        StatusLabel::Blocked,
        StatusLabel::InProgress,
        StatusLabel::WaitingForResponse,
        StatusLabel::WaitingForReview,
    ];

    /// Name of the matching option on the board's `Status` field.
    pub fn board_name(self) -> &'static str {
        match self {
            StatusLabel::Approved => "Approved",
            StatusLabel::Closed => "Closed",
            StatusLabel::Blocked => "Blocked",
            StatusLabel::InProgress => "In Progress",
            StatusLabel::WaitingForResponse => "Waiting for Response",
            StatusLabel::WaitingForReview => "Waiting for Review",
        }
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.board_name())
    }
}

/// One row of the decision table.
struct StatusRule {
    /// Short name of the signal that decided, for logs.
    signal: &'static str,
    applies: fn(&ItemRecord) -> bool,
    label: StatusLabel,
}

const STATUS_RULES: [StatusRule; 6] = [
    StatusRule {
        signal: "reviews",
        applies: is_approved,
        label: StatusLabel::Approved,
    },
    StatusRule {
        signal: "state",
        applies: is_closed,
        label: StatusLabel::Closed,
    },
    StatusRule {
        signal: "milestone",
        applies: is_blocked,
        label: StatusLabel::Blocked,
    },
    StatusRule {
        signal: "draft",
        applies: is_draft,
        label: StatusLabel::InProgress,
    },
    StatusRule {
        signal: "state",
        applies: has_unknown_state,
        label: StatusLabel::InProgress,
    },
    StatusRule {
        signal: "label",
        applies: is_waiting_for_response,
        label: StatusLabel::WaitingForResponse,
    },
];

fn is_approved(r: &ItemRecord) -> bool {
    r.review_decision == Some(ReviewDecision::Approved)
}

fn is_closed(r: &ItemRecord) -> bool {
    r.state.is_closed()
}

fn is_blocked(r: &ItemRecord) -> bool {
    r.milestone.as_deref() == Some(BLOCKED_MILESTONE)
}

fn is_draft(r: &ItemRecord) -> bool {
    r.draft
}

fn has_unknown_state(r: &ItemRecord) -> bool {
    r.state == LifecycleState::Unknown
}

fn is_waiting_for_response(r: &ItemRecord) -> bool {
    r.has_label(WAITING_RESPONSE_LABEL)
}

/// Signal name reported for the fall-through rule.
const DEFAULT_SIGNAL: &str = "default";

/// Read-only inputs for classifying one item.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationContext<'a> {
    /// The normalized source record.
    pub record: &'a ItemRecord,
    /// Board layout, including the status option ids.
    pub board: &'a BoardMetadata,
    /// Reference time for elapsed-day arithmetic.
    pub now: Timestamp,
}

impl<'a> ClassificationContext<'a> {
    /// Bundles the inputs.
    pub fn new(record: &'a ItemRecord, board: &'a BoardMetadata, now: Timestamp) -> Self {
        Self { record, board, now }
    }
}

/// Outcome of classifying one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Assigned status.
    pub status: StatusLabel,
    /// Signal that decided the status (`reviews`, `state`, `milestone`, ...).
    pub signal: String,
    /// Whole days the item has been (or was) open.
    pub days_open: i64,
    /// Whole days the item has been waiting for review. Zero unless the status
    /// is [`StatusLabel::WaitingForReview`].
    pub days_waiting: i64,
}

/// Runs the decision table and returns the label and deciding signal.
pub fn tentative_status(record: &ItemRecord) -> (StatusLabel, &'static str) {
    STATUS_RULES
        .iter()
        .find(|rule| (rule.applies)(record))
        .map(|rule| (rule.label, rule.signal))
        .unwrap_or((StatusLabel::WaitingForReview, DEFAULT_SIGNAL))
}

/// Whole days the record has been open as of `now`. Closed records use their
/// closure time instead of `now`.
pub fn days_open(record: &ItemRecord, now: Timestamp) -> i64 {
    let end = match (&record.state, record.closed_at) {
        (state, Some(closed_at)) if state.is_closed() => closed_at,
        _ => now,
    };
    record.created_at.whole_days_until(end)
}

/// Classifies a record whose timeline, if needed, is already in hand.
///
/// `events` is only consulted when the status is Waiting for Review; it must
/// be in chronological order.
pub fn classify_with_events(
    record: &ItemRecord,
    now: Timestamp,
    events: &[EventRecord],
) -> Classification {
    let (status, signal) = tentative_status(record);
    let days_open = days_open(record, now);
    let days_waiting = if status == StatusLabel::WaitingForReview {
        waiting_days(days_open, now, events)
    } else {
        0
    };
    Classification {
        status,
        signal: signal.to_string(),
        days_open,
        days_waiting,
    }
}

/// Classifies a record, fetching its timeline only when the tentative status
/// is Waiting for Review.
///
/// A timeline failure is returned to the caller; no partial classification is
/// produced.
#[instrument(skip_all, fields(number = ctx.record.number))]
pub async fn classify<T>(
    ctx: &ClassificationContext<'_>,
    timeline: &T,
) -> Result<Classification, SyncError>
where
    T: EventTimeline + ?Sized,
{
    let record = ctx.record;
    let (status, _) = tentative_status(record);
    if status != StatusLabel::WaitingForReview {
        return Ok(classify_with_events(record, ctx.now, &[]));
    }

    let events = timeline.events(record).await?;
    debug!(events = events.len(), "scanning timeline");
    Ok(classify_with_events(record, ctx.now, &events))
}

/// Starts at `days_open` and resets to the age of the first event that ended
/// a waiting condition, if any.
fn waiting_days(days_open: i64, now: Timestamp, events: &[EventRecord]) -> i64 {
    events
        .iter()
        .find(|event| event.ends_wait())
        .map(|event| event.created_at.whole_days_until(now))
        .unwrap_or(days_open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentNodeId, EventKind, ItemKind, ProjectId};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap())
    }

    fn days_ago(days: i64) -> Timestamp {
        Timestamp::from_utc(now().as_datetime() - Duration::days(days))
    }

    fn record() -> ItemRecord {
        ItemRecord {
            kind: ItemKind::PullRequest,
            content_id: ContentNodeId::new("PR_kwDO").unwrap(),
            number: 4242,
            title: "Add resource".into(),
            author: "octocat".into(),
            assignees: Vec::new(),
            review_decision: None,
            state: LifecycleState::Open,
            milestone: None,
            draft: false,
            labels: BTreeSet::new(),
            created_at: days_ago(20),
            closed_at: None,
            comment_count: 0,
            review_count: 0,
            review_comment_count: 0,
            filtered_review_count: 0,
            filtered_review_comment_count: 0,
        }
    }

    fn board() -> BoardMetadata {
        BoardMetadata {
            project_id: ProjectId::new("PVT_1").unwrap(),
            fields: Vec::new(),
        }
    }

    fn unlabeled(label: &str, at: Timestamp) -> EventRecord {
        EventRecord {
            kind: EventKind::Unlabeled,
            label: Some(label.into()),
            milestone: None,
            created_at: at,
        }
    }

    struct FixedTimeline {
        events: Vec<EventRecord>,
        calls: AtomicUsize,
    }

    impl FixedTimeline {
        fn new(events: Vec<EventRecord>) -> Self {
            Self {
                events,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EventTimeline for FixedTimeline {
        async fn events(&self, _record: &ItemRecord) -> Result<Vec<EventRecord>, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.events.clone())
        }
    }

    #[test]
    fn test_approved_beats_closed() {
        let record = ItemRecord {
            review_decision: Some(ReviewDecision::Approved),
            state: LifecycleState::Closed,
            closed_at: Some(days_ago(1)),
            ..record()
        };
        let result = classify_with_events(&record, now(), &[]);
        assert_eq!(result.status, StatusLabel::Approved);
        assert_eq!(result.signal, "reviews");
    }

    #[test]
    fn test_closed_days_open_uses_closure_time() {
        let created = days_ago(40);
        let record = ItemRecord {
            state: LifecycleState::Closed,
            created_at: created,
            closed_at: Some(Timestamp::from_utc(created.as_datetime() + Duration::days(5))),
            ..record()
        };

        let result = classify_with_events(&record, now(), &[]);
        assert_eq!(result.status, StatusLabel::Closed);
        assert_eq!(result.days_open, 5);

        let much_later = Timestamp::from_utc(now().as_datetime() + Duration::days(365));
        assert_eq!(classify_with_events(&record, much_later, &[]).days_open, 5);
    }

    #[test]
    fn test_merged_counts_as_closed() {
        let record = ItemRecord {
            state: LifecycleState::Merged,
            closed_at: Some(days_ago(2)),
            ..record()
        };
        assert_eq!(tentative_status(&record).0, StatusLabel::Closed);
    }

    #[test]
    fn test_blocked_then_draft_then_unknown_state() {
        let blocked = ItemRecord {
            milestone: Some(BLOCKED_MILESTONE.into()),
            draft: true,
            ..record()
        };
        assert_eq!(tentative_status(&blocked), (StatusLabel::Blocked, "milestone"));

        let draft = ItemRecord {
            draft: true,
            ..record()
        };
        assert_eq!(tentative_status(&draft), (StatusLabel::InProgress, "draft"));

        let unknown = ItemRecord {
            state: LifecycleState::Unknown,
            labels: BTreeSet::from([WAITING_RESPONSE_LABEL.to_string()]),
            ..record()
        };
        assert_eq!(tentative_status(&unknown), (StatusLabel::InProgress, "state"));
    }

    #[test]
    fn test_waiting_response_label() {
        let record = ItemRecord {
            labels: BTreeSet::from(["bug".to_string(), WAITING_RESPONSE_LABEL.to_string()]),
            ..record()
        };
        let result = classify_with_events(&record, now(), &[]);
        assert_eq!(result.status, StatusLabel::WaitingForResponse);
        assert_eq!(result.days_waiting, 0);
    }

    #[test]
    fn test_other_milestone_does_not_block() {
        let record = ItemRecord {
            milestone: Some("v4.0.0".into()),
            ..record()
        };
        assert_eq!(tentative_status(&record).0, StatusLabel::WaitingForReview);
    }

    #[test]
    fn test_waiting_days_from_first_qualifying_event() {
        let events = vec![
            unlabeled("bug", days_ago(15)),
            unlabeled(WAITING_RESPONSE_LABEL, days_ago(10)),
            unlabeled(WAITING_RESPONSE_LABEL, days_ago(3)),
        ];
        let result = classify_with_events(&record(), now(), &events);
        assert_eq!(result.status, StatusLabel::WaitingForReview);
        assert_eq!(result.days_open, 20);
        assert_eq!(result.days_waiting, 10);
    }

    #[test]
    fn test_waiting_days_after_blocked_milestone_removed() {
        let events = vec![EventRecord {
            kind: EventKind::Demilestoned,
            label: None,
            milestone: Some(BLOCKED_MILESTONE.into()),
            created_at: days_ago(7),
        }];
        assert_eq!(classify_with_events(&record(), now(), &events).days_waiting, 7);
    }

    #[test]
    fn test_no_qualifying_event_waits_since_creation() {
        let events = vec![unlabeled("needs-triage", days_ago(4))];
        let result = classify_with_events(&record(), now(), &events);
        assert_eq!(result.days_waiting, result.days_open);
        assert_eq!(result.days_waiting, 20);
    }

    #[test]
    fn test_days_truncate() {
        let record = ItemRecord {
            created_at: Timestamp::from_utc(now().as_datetime() - Duration::hours(47)),
            ..record()
        };
        assert_eq!(days_open(&record, now()), 1);
    }

    #[tokio::test]
    async fn test_timeline_fetched_only_for_waiting_for_review() {
        let board = board();
        let timeline = FixedTimeline::new(vec![unlabeled(WAITING_RESPONSE_LABEL, days_ago(10))]);

        let approved = ItemRecord {
            review_decision: Some(ReviewDecision::Approved),
            ..record()
        };
        let ctx = ClassificationContext::new(&approved, &board, now());
        classify(&ctx, &timeline).await.unwrap();
        assert_eq!(timeline.calls.load(Ordering::SeqCst), 0);

        let open = record();
        let ctx = ClassificationContext::new(&open, &board, now());
        let result = classify(&ctx, &timeline).await.unwrap();
        assert_eq!(timeline.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.days_waiting, 10);
    }

    #[test]
    fn test_board_names() {
        let names: Vec<_> = StatusLabel::ALL.iter().map(|s| s.board_name()).collect();
        assert_eq!(
            names,
            [
                "Approved",
                "Closed",
                "Blocked",
                "In Progress",
                "Waiting for Response",
                "Waiting for Review"
            ]
        );
    }
}
