//! `project`: copy scheduled pull requests from another board.
//!
//! Every source item with a due date is resolved to its pull request, added to
//! the target board when missing (with status `Unclaimed PR`), and then has its
//! request type, number, author and due date written.

use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use github::{parse_github_url, GithubProjectBoard, PullRequestFeed};
use reconcile::{
    BoardItem, BoardMetadata, FieldUpdate, ItemIndex, ItemKind, ItemRecord, ProjectBoard,
    SyncError, ValueKind, STATUS_FIELD,
};

use crate::config::ProjectConfig;

use super::connect;

/// Status given to items this command adds.
pub const UNCLAIMED_STATUS: &str = "Unclaimed PR";

/// Totals for one copy run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub copied: usize,
    pub added: usize,
    pub skipped: usize,
    pub failures: Vec<(String, String)>,
}

/// The field writes copied from a source item.
pub fn copy_updates(metadata: &BoardMetadata, source: &BoardItem, pr: &ItemRecord) -> Vec<FieldUpdate> {
    let text = |name: &str, value: String| {
        FieldUpdate::new(name, metadata.field_id(name), ValueKind::Text, value)
    };
    let mut updates = vec![
        text("Request Type", source.request_type.clone().unwrap_or_default()),
        text("PR#", pr.number.to_string()),
        text("User", pr.author.clone()),
    ];
    if let Some(due) = source.due_date.as_deref() {
        updates.push(FieldUpdate::new(
            "Due Date",
            metadata.field_id("Due Date"),
            ValueKind::Date,
            due,
        ));
    }
    updates
}

/// Adds `pr` to the target board if needed and writes the copied fields.
/// Returns `true` if the item was added.
pub async fn copy_item<B: ProjectBoard + ?Sized>(
    board: &B,
    metadata: &BoardMetadata,
    index: &mut ItemIndex,
    source: &BoardItem,
    pr: &ItemRecord,
    dry_run: bool,
) -> Result<bool, SyncError> {
    let updates = copy_updates(metadata, source, pr);
    if dry_run {
        debug!(number = pr.number, fields = updates.len(), "dry run, not writing");
        return Ok(false);
    }

    let (item, added) = match index.get(&pr.content_id) {
        Some(item) => (item.clone(), false),
        None => {
            let item = board.add_item(metadata, &pr.content_id).await?;
            index.insert(pr.content_id.clone(), item.clone());
            match metadata.status_option(UNCLAIMED_STATUS) {
                Some(option) => {
                    let status = FieldUpdate::new(
                        STATUS_FIELD,
                        metadata.field_id(STATUS_FIELD),
                        ValueKind::SingleSelect,
                        option,
                    );
                    board.update_item(metadata, &item, &[status]).await?;
                }
                None => warn!(status = UNCLAIMED_STATUS, "status option not found on project"),
            }
            (item, true)
        }
    };

    board.update_item(metadata, &item, &updates).await?;
    Ok(added)
}

/// Copies every scheduled pull request from the source board.
#[instrument(skip_all, fields(source = %format!("{}/{}", config.source_owner, config.source_number)))]
pub async fn run(config: &ProjectConfig) -> anyhow::Result<CopySummary> {
    let (_, client) = connect(&config.token, &config.api_url)?;
    let target = GithubProjectBoard::new(client.clone(), &config.project_owner, config.project_number);
    let source = GithubProjectBoard::new(client.clone(), &config.source_owner, config.source_number);
    let feed = PullRequestFeed::new(client);

    let metadata = target.load_metadata().await.with_context(|| {
        format!(
            "failed to load project {}/{}",
            config.project_owner, config.project_number
        )
    })?;
    let existing = target
        .list_items(&metadata)
        .await
        .context("failed to list target project items")?;
    let mut index = ItemIndex::from_items(&existing);

    let source_metadata = source.load_metadata().await.with_context(|| {
        format!(
            "failed to load source project {}/{}",
            config.source_owner, config.source_number
        )
    })?;
    let items = source
        .list_items(&source_metadata)
        .await
        .context("failed to list source project items")?;
    info!(target_items = existing.len(), source_items = items.len(), "projects loaded");

    let mut summary = CopySummary::default();
    for item in &items {
        if item.due_date.as_deref().map_or(true, str::is_empty) {
            debug!(item = %item.id, "skipping, no due date");
            summary.skipped += 1;
            continue;
        }

        let url = match parse_github_url(&item.url) {
            Ok(url) if url.kind == ItemKind::PullRequest => url,
            Ok(_) => {
                debug!(item = %item.id, url = %item.url, "skipping, not a pull request");
                summary.skipped += 1;
                continue;
            }
            Err(error) => {
                warn!(item = %item.id, url = %item.url, %error, "skipping, unparseable URL");
                summary.failures.push((item.url.clone(), error.to_string()));
                continue;
            }
        };

        let result = async {
            let pr = feed
                .fetch_one(&url.repo, url.number, &Default::default())
                .await?;
            copy_item(&target, &metadata, &mut index, item, &pr, config.dry_run).await
        }
        .await;

        match result {
            Ok(added) => {
                info!(repo = %url.repo, number = url.number, added, "item copied");
                summary.copied += 1;
                summary.added += usize::from(added);
            }
            Err(error) => {
                warn!(repo = %url.repo, number = url.number, %error, "item failed");
                summary.failures.push((item.url.clone(), error.to_string()));
            }
        }
    }
    Ok(summary)
}
