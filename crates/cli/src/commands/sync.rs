//! `prs` and `issues`: sync repository items onto the target board.

use std::fmt::Write as _;

use anyhow::Context;
use tracing::{info, info_span, warn, Instrument};

use github::{GithubProjectBoard, GithubTimeline, IssueFeed, PullRequestFeed, PullRequestQuery};
use reconcile::{
    BoardMetadata, FieldCatalog, ItemKind, ItemRecord, ItemSynchronizer, ProjectBoard,
    RepositoryId, SyncError, SyncSummary, Timestamp, STATUS_FIELD,
};

use crate::config::SyncConfig;

use super::connect;

/// Syncs every configured repository and returns one summary per repository.
pub async fn run(
    config: &SyncConfig,
    kind: ItemKind,
) -> anyhow::Result<Vec<(RepositoryId, SyncSummary)>> {
    let catalog = FieldCatalog::for_kind(kind);
    let active_fields = config.active_fields(catalog)?;

    let (_, client) = connect(&config.token, &config.api_url)?;
    let board = GithubProjectBoard::new(client.clone(), &config.project_owner, config.project_number);
    let timeline = GithubTimeline::new(client.clone());

    let metadata = board.load_metadata().await.with_context(|| {
        format!(
            "failed to load project {}/{}",
            config.project_owner, config.project_number
        )
    })?;
    info!(project = %metadata.project_id, fields = metadata.fields.len(), "project loaded");
    log_fields(&metadata);

    let existing = board
        .list_items(&metadata)
        .await
        .context("failed to list project items")?;
    info!(items = existing.len(), "existing project items");

    let mut synchronizer = ItemSynchronizer::new(
        &board,
        &timeline,
        &metadata,
        &existing,
        catalog,
        active_fields,
    )
    .with_dry_run(config.dry_run);

    let mut summaries = Vec::with_capacity(config.repos.len());
    for repo in &config.repos {
        let span = info_span!("repo", repo = %repo, kind = ?kind);
        let records = fetch(&client, config, repo, kind)
            .instrument(span.clone())
            .await
            .with_context(|| format!("failed to fetch items for {repo}"))?;
        let total = records.len();
        let records = config.filters.apply(records);
        span.in_scope(|| info!(found = total, selected = records.len(), "items fetched"));

        let now = Timestamp::now();
        let mut summary = SyncSummary::default();
        for record in &records {
            match synchronizer.sync_item(record, now).instrument(span.clone()).await {
                Ok(outcome) => summary.record(&outcome),
                Err(error) => {
                    span.in_scope(|| warn!(number = record.number, %error, "item failed"));
                    summary.record_failure(record.number, &error);
                }
            }
        }
        summaries.push((repo.clone(), summary));
    }
    Ok(summaries)
}

async fn fetch(
    client: &github::GithubClient,
    config: &SyncConfig,
    repo: &RepositoryId,
    kind: ItemKind,
) -> Result<Vec<ItemRecord>, SyncError> {
    match kind {
        ItemKind::PullRequest => {
            let query = PullRequestQuery {
                include_closed: config.include_closed,
                limit: config.limit,
                reviewers: config.reviewers.clone(),
            };
            PullRequestFeed::new(client.clone()).fetch(repo, &query).await
        }
        ItemKind::Issue => {
            IssueFeed::new(client.clone())
                .fetch(repo, config.include_closed, config.limit)
                .await
        }
    }
}

fn log_fields(metadata: &BoardMetadata) {
    for field in &metadata.fields {
        tracing::debug!(name = %field.name, id = %field.id, "project field");
        if field.name == STATUS_FIELD {
            for (name, id) in &field.options {
                tracing::debug!(%name, %id, "status option");
            }
        }
    }
}

/// Renders a repository summary: item numbers grouped by status, then totals.
pub fn render_summary(repo: &RepositoryId, summary: &SyncSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{repo}: {} synced, {} added", summary.synced(), summary.added);
    for (status, numbers) in &summary.by_status {
        let list: Vec<String> = numbers.iter().map(u64::to_string).collect();
        let _ = writeln!(out, "  {status} x{} - {}", numbers.len(), list.join(","));
    }
    if let Some(days) = summary.average_open_days() {
        let _ = writeln!(out, "  average open days: {days}");
    }
    if let Some(days) = summary.average_waiting_days() {
        let _ = writeln!(
            out,
            "  average waiting days: {days} ({} waiting)",
            summary.waiting_items
        );
    }
    for (number, message) in &summary.failures {
        let _ = writeln!(out, "  FAILED #{number}: {message}");
    }
    out
}
