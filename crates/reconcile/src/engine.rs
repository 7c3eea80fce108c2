//! Per-item synchronization.
//!
//! For each record: look the content up on the board (adding it if missing),
//! classify it, compute the active fields, and write them in one mutation.
//! Failures are returned to the caller, which decides whether to move on to
//! the next record. Items already written stay written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    classify, BoardItem, BoardMetadata, Classification, ClassificationContext, EventTimeline,
    FieldCatalog, FieldContext, ItemId, ItemIndex, ItemRecord, ProjectBoard, StatusLabel,
    SyncError, Timestamp,
};

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Issue or pull request number.
    pub number: u64,
    /// Board item the record maps to. `None` only in dry-run mode for content
    /// not yet on the board.
    pub item_id: Option<ItemId>,
    /// The content was added to the board during this call.
    pub added: bool,
    /// Classification result.
    pub classification: Classification,
    /// Names of the fields written (or that would have been, in dry-run mode).
    pub fields: Vec<String>,
}

/// Drives one board for the length of a run.
pub struct ItemSynchronizer<'a, B: ?Sized, T: ?Sized> {
    board: &'a B,
    timeline: &'a T,
    metadata: &'a BoardMetadata,
    index: ItemIndex,
    catalog: &'static FieldCatalog,
    active_fields: Vec<String>,
    dry_run: bool,
}

impl<'a, B, T> ItemSynchronizer<'a, B, T>
where
    B: ProjectBoard + ?Sized,
    T: EventTimeline + ?Sized,
{
    /// Creates a synchronizer over the board's current items.
    pub fn new(
        board: &'a B,
        timeline: &'a T,
        metadata: &'a BoardMetadata,
        existing: &[BoardItem],
        catalog: &'static FieldCatalog,
        active_fields: Vec<String>,
    ) -> Self {
        Self {
            board,
            timeline,
            metadata,
            index: ItemIndex::from_items(existing),
            catalog,
            active_fields,
            dry_run: false,
        }
    }

    /// Classify and compute only; never add or write.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Field names written for each record.
    pub fn active_fields(&self) -> &[String] {
        &self.active_fields
    }

    /// Synchronizes one record.
    #[instrument(skip_all, fields(number = record.number, content = %record.content_id, dry_run = self.dry_run))]
    pub async fn sync_item(
        &mut self,
        record: &ItemRecord,
        now: Timestamp,
    ) -> Result<ItemOutcome, SyncError> {
        let existing = self.index.get(&record.content_id).cloned();
        let added = existing.is_none() && !self.dry_run;
        let item_id = match existing {
            Some(id) => Some(id),
            None if self.dry_run => None,
            None => {
                let id = self
                    .board
                    .add_item(self.metadata, &record.content_id)
                    .await?;
                debug!(item = %id, "added to board");
                self.index.insert(record.content_id.clone(), id.clone());
                Some(id)
            }
        };

        let ctx = ClassificationContext::new(record, self.metadata, now);
        let classification = classify(&ctx, self.timeline).await?;

        let field_ctx = FieldContext {
            item: ctx,
            classification: &classification,
        };
        let updates = self.catalog.build_updates(&self.active_fields, &field_ctx)?;
        let fields: Vec<String> = updates.iter().map(|u| u.field.name.clone()).collect();

        if let Some(item) = item_id.as_ref().filter(|_| !self.dry_run) {
            self.board.update_item(self.metadata, item, &updates).await?;
        }

        info!(
            status = %classification.status,
            signal = %classification.signal,
            days_open = classification.days_open,
            days_waiting = classification.days_waiting,
            fields = fields.len(),
            "item synced"
        );

        Ok(ItemOutcome {
            number: record.number,
            item_id,
            added,
            classification,
            fields,
        })
    }
}

/// Run totals printed at the end of a sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Item numbers per assigned status.
    pub by_status: BTreeMap<StatusLabel, Vec<u64>>,
    /// Items that failed, with the error message.
    pub failures: Vec<(u64, String)>,
    /// Items added to the board.
    pub added: usize,
    /// Items classified as waiting for review.
    pub waiting_items: u64,
    /// Sum of their waiting days.
    pub waiting_days_total: i64,
    /// Items seen.
    pub total: usize,
    /// Sum of open days across all synced items.
    pub open_days_total: i64,
}

impl SyncSummary {
    /// Records a successful item.
    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.total += 1;
        if outcome.added {
            self.added += 1;
        }
        let c = &outcome.classification;
        self.open_days_total += c.days_open;
        if c.status == StatusLabel::WaitingForReview {
            self.waiting_items += 1;
            self.waiting_days_total += c.days_waiting;
        }
        self.by_status
            .entry(c.status)
            .or_default()
            .push(outcome.number);
    }

    /// Records a failed item.
    pub fn record_failure(&mut self, number: u64, error: &SyncError) {
        self.total += 1;
        self.failures.push((number, error.to_string()));
    }

    /// Number of items that synced.
    pub fn synced(&self) -> usize {
        self.total - self.failures.len()
    }

    /// Average waiting days across waiting-for-review items, truncated.
    pub fn average_waiting_days(&self) -> Option<i64> {
        (self.waiting_items > 0).then(|| self.waiting_days_total / self.waiting_items as i64)
    }

    /// Average open days across synced items, truncated.
    pub fn average_open_days(&self) -> Option<i64> {
        let synced = self.synced();
        (synced > 0).then(|| self.open_days_total / synced as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        update_item_fields, BoardField, ContentNodeId, EventRecord, FieldUpdate, GraphQlRequest,
        ItemKind, LifecycleState, ProjectId, RequestExecutor, STATUS_FIELD,
    };
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Mutex;

    fn now() -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap())
    }

    fn record(number: u64, node: &str) -> ItemRecord {
        ItemRecord {
            kind: ItemKind::PullRequest,
            content_id: ContentNodeId::new(node).unwrap(),
            number,
            title: "Update docs".into(),
            author: "octocat".into(),
            assignees: Vec::new(),
            review_decision: None,
            state: LifecycleState::Open,
            milestone: None,
            draft: false,
            labels: BTreeSet::new(),
            created_at: Timestamp::from_utc(now().as_datetime() - Duration::days(8)),
            closed_at: None,
            comment_count: 1,
            review_count: 0,
            review_comment_count: 0,
            filtered_review_count: 0,
            filtered_review_comment_count: 0,
        }
    }

    fn metadata() -> BoardMetadata {
        let plain = |id: &str, name: &str| BoardField {
            id: id.into(),
            name: name.into(),
            options: BTreeMap::new(),
        };
        BoardMetadata {
            project_id: ProjectId::new("PVT_1").unwrap(),
            fields: vec![
                plain("F_pr", "PR#"),
                plain("F_user", "User"),
                plain("F_open", "Open Days"),
                plain("F_wait", "Waiting Days"),
                BoardField {
                    id: "F_status".into(),
                    name: STATUS_FIELD.into(),
                    options: StatusLabel::ALL
                        .iter()
                        .map(|s| (s.board_name().to_string(), format!("opt_{s:?}")))
                        .collect(),
                },
            ],
        }
    }

    /// Board whose writes go through the real mutation builder into a map.
    #[derive(Default)]
    struct MemoryBoard {
        adds: Mutex<Vec<ContentNodeId>>,
        fields: Mutex<HashMap<(String, String), Value>>,
        writes: Mutex<usize>,
    }

    #[async_trait]
    impl RequestExecutor for MemoryBoard {
        async fn execute(&self, request: &GraphQlRequest) -> Result<Value, SyncError> {
            *self.writes.lock().unwrap() += 1;
            let item = request.variables["item"].as_str().unwrap().to_string();
            let mut fields = self.fields.lock().unwrap();
            let mut i = 0;
            while let Some(field) = request.variables.get(&format!("f{i}_field")) {
                fields.insert(
                    (item.clone(), field.as_str().unwrap().to_string()),
                    request.variables[&format!("f{i}_value")].clone(),
                );
                i += 1;
            }
            Ok(Value::Null)
        }
    }

    #[async_trait]
    impl ProjectBoard for MemoryBoard {
        async fn load_metadata(&self) -> Result<BoardMetadata, SyncError> {
            Ok(metadata())
        }

        async fn list_items(&self, _board: &BoardMetadata) -> Result<Vec<BoardItem>, SyncError> {
            Ok(Vec::new())
        }

        async fn add_item(
            &self,
            _board: &BoardMetadata,
            content: &ContentNodeId,
        ) -> Result<ItemId, SyncError> {
            let mut adds = self.adds.lock().unwrap();
            adds.push(content.clone());
            Ok(ItemId::new(format!("PVTI_{}", adds.len())).unwrap())
        }

        async fn update_item(
            &self,
            board: &BoardMetadata,
            item: &ItemId,
            updates: &[FieldUpdate],
        ) -> Result<(), SyncError> {
            update_item_fields(self, &board.project_id, item, updates).await
        }
    }

    struct NoEvents;

    #[async_trait]
    impl EventTimeline for NoEvents {
        async fn events(&self, _record: &ItemRecord) -> Result<Vec<EventRecord>, SyncError> {
            Ok(Vec::new())
        }
    }

    fn active() -> Vec<String> {
        ["PR#", "Status", "User", "Open Days", "Waiting Days"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_adds_missing_item_then_writes_fields() {
        let board = MemoryBoard::default();
        let meta = metadata();
        let mut sync = ItemSynchronizer::new(
            &board,
            &NoEvents,
            &meta,
            &[],
            FieldCatalog::pull_requests(),
            active(),
        );

        let outcome = sync.sync_item(&record(11, "PR_a"), now()).await.unwrap();

        assert!(outcome.added);
        assert_eq!(outcome.classification.status, StatusLabel::WaitingForReview);
        assert_eq!(outcome.classification.days_waiting, 8);
        assert_eq!(outcome.fields.len(), 5);
        assert_eq!(*board.writes.lock().unwrap(), 1);
        let fields = board.fields.lock().unwrap();
        assert_eq!(
            fields[&("PVTI_1".to_string(), "F_status".to_string())],
            "opt_WaitingForReview"
        );
        assert_eq!(
            fields[&("PVTI_1".to_string(), "F_open".to_string())],
            serde_json::json!(8)
        );
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let board = MemoryBoard::default();
        let meta = metadata();
        let mut sync = ItemSynchronizer::new(
            &board,
            &NoEvents,
            &meta,
            &[],
            FieldCatalog::pull_requests(),
            active(),
        );

        sync.sync_item(&record(11, "PR_a"), now()).await.unwrap();
        let first = board.fields.lock().unwrap().clone();

        let again = sync.sync_item(&record(11, "PR_a"), now()).await.unwrap();
        let second = board.fields.lock().unwrap().clone();

        assert!(!again.added);
        assert_eq!(board.adds.lock().unwrap().len(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_existing_item_is_not_added() {
        let board = MemoryBoard::default();
        let meta = metadata();
        let existing = BoardItem {
            id: ItemId::new("PVTI_existing").unwrap(),
            item_type: "PULL_REQUEST".into(),
            content_id: ContentNodeId::new("PR_a"),
            title: "Update docs".into(),
            url: String::new(),
            request_type: None,
            due_date: None,
            status_option: None,
        };
        let mut sync = ItemSynchronizer::new(
            &board,
            &NoEvents,
            &meta,
            &[existing],
            FieldCatalog::pull_requests(),
            active(),
        );

        let outcome = sync.sync_item(&record(11, "PR_a"), now()).await.unwrap();
        assert_eq!(outcome.item_id, ItemId::new("PVTI_existing"));
        assert!(board.adds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let board = MemoryBoard::default();
        let meta = metadata();
        let mut sync = ItemSynchronizer::new(
            &board,
            &NoEvents,
            &meta,
            &[],
            FieldCatalog::pull_requests(),
            active(),
        )
        .with_dry_run(true);

        let outcome = sync.sync_item(&record(11, "PR_a"), now()).await.unwrap();
        assert_eq!(outcome.item_id, None);
        assert_eq!(outcome.fields.len(), 5);
        assert!(board.adds.lock().unwrap().is_empty());
        assert_eq!(*board.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_active_field_fails_item() {
        let board = MemoryBoard::default();
        let meta = metadata();
        let mut sync = ItemSynchronizer::new(
            &board,
            &NoEvents,
            &meta,
            &[],
            FieldCatalog::pull_requests(),
            vec!["Nope".to_string()],
        );
        let err = sync.sync_item(&record(11, "PR_a"), now()).await.unwrap_err();
        assert!(matches!(err, SyncError::UnknownField(_)));
        assert_eq!(*board.writes.lock().unwrap(), 0);
    }

    #[test]
    fn test_summary_averages() {
        let mut summary = SyncSummary::default();
        let outcome = |number, status, days_waiting| ItemOutcome {
            number,
            item_id: None,
            added: false,
            classification: Classification {
                status,
                signal: "default".into(),
                days_open: 10,
                days_waiting,
            },
            fields: Vec::new(),
        };
        summary.record(&outcome(1, StatusLabel::WaitingForReview, 4));
        summary.record(&outcome(2, StatusLabel::WaitingForReview, 7));
        summary.record(&outcome(3, StatusLabel::Approved, 0));
        summary.record_failure(
            4,
            &SyncError::Decode {
                message: "missing data".into(),
            },
        );

        assert_eq!(summary.average_waiting_days(), Some(5));
        assert_eq!(summary.average_open_days(), Some(10));
        assert_eq!(summary.synced(), 3);
        assert_eq!(summary.by_status[&StatusLabel::WaitingForReview], vec![1, 2]);
        assert_eq!(SyncSummary::default().average_waiting_days(), None);
    }

    #[test]
    fn test_approved_record_skips_waiting_total() {
        let mut summary = SyncSummary::default();
        summary.record(&ItemOutcome {
            number: 9,
            item_id: None,
            added: true,
            classification: Classification {
                status: StatusLabel::Approved,
                signal: "reviews".into(),
                days_open: 3,
                days_waiting: 0,
            },
            fields: Vec::new(),
        });
        assert_eq!(summary.added, 1);
        assert_eq!(summary.average_waiting_days(), None);
    }
}
