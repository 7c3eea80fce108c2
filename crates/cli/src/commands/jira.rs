//! `jira`: mirror tracker tickets onto the board items of their GitHub issues.
//!
//! Every ticket matching the JQL query names a GitHub issue (or pull request)
//! in a custom field. That item is added to the board when missing, then has
//! the ticket's key, link, title, status, epic, engineer, age and ACV written.

use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use github::{parse_github_url, GithubProjectBoard, IssueFeed, PullRequestFeed};
use jira::JiraClient;
use reconcile::{
    ticket_updates, BoardMetadata, ItemIndex, ItemKind, ItemRecord, ProjectBoard, SyncError,
    TicketRecord, Timestamp,
};

use crate::config::JiraConfig;

use super::connect;

/// Totals for one ticket run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketSummary {
    pub synced: usize,
    pub added: usize,
    pub failures: Vec<(String, String)>,
}

/// Adds `item` to the board if needed and writes the ticket fields. Returns
/// `true` if the item was added.
pub async fn sync_ticket<B: ProjectBoard + ?Sized>(
    board: &B,
    metadata: &BoardMetadata,
    index: &mut ItemIndex,
    ticket: &TicketRecord,
    item: &ItemRecord,
    now: Timestamp,
    dry_run: bool,
) -> Result<bool, SyncError> {
    let updates = ticket_updates(metadata, ticket, item.number, now);
    if dry_run {
        debug!(key = %ticket.key, fields = updates.len(), "dry run, not writing");
        return Ok(false);
    }

    let (board_item, added) = match index.get(&item.content_id) {
        Some(existing) => (existing.clone(), false),
        None => {
            let created = board.add_item(metadata, &item.content_id).await?;
            index.insert(item.content_id.clone(), created.clone());
            (created, true)
        }
    };
    board.update_item(metadata, &board_item, &updates).await?;
    Ok(added)
}

/// Mirrors every ticket matching the configured query.
#[instrument(skip_all, fields(jql = %config.jql))]
pub async fn run(config: &JiraConfig) -> anyhow::Result<TicketSummary> {
    let (_, client) = connect(&config.token, &config.api_url)?;
    let board = GithubProjectBoard::new(client.clone(), &config.project_owner, config.project_number);
    let issues = IssueFeed::new(client.clone());
    let pulls = PullRequestFeed::new(client);

    let metadata = board.load_metadata().await.with_context(|| {
        format!(
            "failed to load project {}/{}",
            config.project_owner, config.project_number
        )
    })?;
    let existing = board
        .list_items(&metadata)
        .await
        .context("failed to list project items")?;
    let mut index = ItemIndex::from_items(&existing);

    let tracker = JiraClient::new(&config.jira_url, &config.jira_user, &config.jira_token)
        .context("failed to create Jira client")?;
    let tickets = tracker
        .search(&config.jql, &config.custom_fields)
        .await
        .with_context(|| format!("failed to list issues for {} @ {}", config.jira_url, config.jql))?;
    info!(tickets = tickets.len(), board_items = existing.len(), "tickets loaded");

    let now = Timestamp::now();
    let mut summary = TicketSummary::default();
    for ticket in &tickets {
        let result = async {
            let link = ticket
                .issue_link
                .as_deref()
                .ok_or_else(|| SyncError::Configuration {
                    message: "ticket has no GitHub link".into(),
                })?;
            let url = parse_github_url(link).map_err(|e| SyncError::Configuration {
                message: format!("invalid GitHub link {link:?}: {e}"),
            })?;
            let item = match url.kind {
                ItemKind::Issue => issues.fetch_one(&url.repo, url.number).await?,
                ItemKind::PullRequest => {
                    pulls
                        .fetch_one(&url.repo, url.number, &Default::default())
                        .await?
                }
            };
            sync_ticket(&board, &metadata, &mut index, ticket, &item, now, config.dry_run).await
        }
        .await;

        match result {
            Ok(added) => {
                info!(key = %ticket.key, added, "ticket synced");
                summary.synced += 1;
                summary.added += usize::from(added);
            }
            Err(error) => {
                warn!(key = %ticket.key, %error, "ticket failed");
                summary.failures.push((ticket.key.clone(), error.to_string()));
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reconcile::{
        BoardField, BoardItem, ContentNodeId, FieldUpdate, FieldValue, ItemId, LifecycleState,
        ProjectId, TICKET_FIELDS,
    };
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryBoard {
        added: Mutex<Vec<ContentNodeId>>,
        writes: Mutex<Vec<(ItemId, Vec<FieldUpdate>)>>,
    }

    #[async_trait]
    impl ProjectBoard for MemoryBoard {
        async fn load_metadata(&self) -> Result<BoardMetadata, SyncError> {
            Ok(metadata())
        }

        async fn list_items(&self, _: &BoardMetadata) -> Result<Vec<BoardItem>, SyncError> {
            Ok(Vec::new())
        }

        async fn add_item(
            &self,
            _: &BoardMetadata,
            content: &ContentNodeId,
        ) -> Result<ItemId, SyncError> {
            self.added.lock().unwrap().push(content.clone());
            Ok(ItemId::new("PVTI_ticket").unwrap())
        }

        async fn update_item(
            &self,
            _: &BoardMetadata,
            item: &ItemId,
            updates: &[FieldUpdate],
        ) -> Result<(), SyncError> {
            self.writes
                .lock()
                .unwrap()
                .push((item.clone(), updates.to_vec()));
            Ok(())
        }
    }

    fn metadata() -> BoardMetadata {
        BoardMetadata {
            project_id: ProjectId::new("PVT_support").unwrap(),
            fields: TICKET_FIELDS
                .iter()
                .map(|(name, _)| BoardField {
                    id: format!("F_{name}"),
                    name: name.to_string(),
                    options: Default::default(),
                })
                .collect(),
        }
    }

    fn ticket() -> TicketRecord {
        TicketRecord {
            key: "SUP-42".into(),
            url: "https://example.atlassian.net/browse/SUP-42".into(),
            summary: "plan shows drift".into(),
            status: "Open".into(),
            epic: None,
            engineer: Some("Dana Smith".into()),
            created_at: None,
            acv: Some(5000.0),
            issue_link: Some("https://github.com/octo/repo/issues/77".into()),
        }
    }

    fn issue() -> ItemRecord {
        ItemRecord {
            kind: ItemKind::Issue,
            content_id: ContentNodeId::new("I_node").unwrap(),
            number: 77,
            title: "plan shows drift".into(),
            author: "customer".into(),
            assignees: Vec::new(),
            review_decision: None,
            state: LifecycleState::Open,
            milestone: None,
            draft: false,
            labels: BTreeSet::new(),
            created_at: Timestamp::now(),
            closed_at: None,
            comment_count: 0,
            review_count: 0,
            review_comment_count: 0,
            filtered_review_count: 0,
            filtered_review_comment_count: 0,
        }
    }

    #[tokio::test]
    async fn test_missing_item_is_added_then_written() {
        let board = MemoryBoard::default();
        let meta = metadata();
        let mut index = ItemIndex::default();

        let added = sync_ticket(
            &board,
            &meta,
            &mut index,
            &ticket(),
            &issue(),
            Timestamp::now(),
            false,
        )
        .await
        .unwrap();

        assert!(added);
        assert_eq!(board.added.lock().unwrap().len(), 1);
        assert!(index.get(&ContentNodeId::new("I_node").unwrap()).is_some());
        let writes = board.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        let updates = &writes[0].1;
        assert_eq!(updates[0].value, FieldValue::text("SUP-42"));
        assert!(updates
            .iter()
            .any(|u| u.field.name == "#" && u.value == FieldValue::Number(77.0)));
    }

    #[tokio::test]
    async fn test_indexed_item_is_not_added_again() {
        let board = MemoryBoard::default();
        let meta = metadata();
        let mut index = ItemIndex::default();
        index.insert(
            ContentNodeId::new("I_node").unwrap(),
            ItemId::new("PVTI_existing").unwrap(),
        );

        let added = sync_ticket(
            &board,
            &meta,
            &mut index,
            &ticket(),
            &issue(),
            Timestamp::now(),
            false,
        )
        .await
        .unwrap();

        assert!(!added);
        assert!(board.added.lock().unwrap().is_empty());
        assert_eq!(board.writes.lock().unwrap()[0].0.as_str(), "PVTI_existing");
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let board = MemoryBoard::default();
        let mut index = ItemIndex::default();

        let added = sync_ticket(
            &board,
            &metadata(),
            &mut index,
            &ticket(),
            &issue(),
            Timestamp::now(),
            true,
        )
        .await
        .unwrap();

        assert!(!added);
        assert!(board.added.lock().unwrap().is_empty());
        assert!(board.writes.lock().unwrap().is_empty());
        assert!(index.is_empty());
    }
}
