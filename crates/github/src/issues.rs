//! Issue feed.

use serde::Deserialize;
use tracing::{debug, instrument};

use reconcile::{
    ContentNodeId, GraphQlRequest, ItemKind, ItemRecord, LifecycleState, RepositoryId, SyncError,
};

use crate::client::GithubClient;
use crate::project::PageInfo;
use crate::pulls::{parse_time, Connection, Label, Login, Milestone};

const ISSUES_PAGE_SIZE: u32 = 100;

const ISSUE_FIELDS: &str = r#"fragment IssueFields on Issue {
  id
  number
  title
  state
  createdAt
  closedAt
  author { login }
  assignees(first: 10) { nodes { login } }
  labels(first: 100) { nodes { name } }
  milestone { title }
  comments { totalCount }
}"#;

const ISSUES_QUERY: &str = r#"query($owner: String!, $name: String!, $states: [IssueState!], $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    issues(first: $first, after: $cursor, states: $states, orderBy: {field: CREATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes { ...IssueFields }
    }
  }
}"#;

const ISSUE_QUERY: &str = r#"query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) { ...IssueFields }
  }
}"#;

fn with_fields(query: &str) -> String {
    format!("{query}\n{ISSUE_FIELDS}")
}

/// Reads issues from GitHub.
#[derive(Debug, Clone)]
pub struct IssueFeed {
    client: GithubClient,
}

#[derive(Debug, Deserialize)]
struct RepositoryData {
    repository: Option<RepositoryIssues>,
}

#[derive(Debug, Deserialize)]
struct RepositoryIssues {
    issues: IssuePage,
}

#[derive(Debug, Deserialize)]
struct SingleData {
    repository: Option<SingleIssue>,
}

#[derive(Debug, Deserialize)]
struct SingleIssue {
    issue: Option<IssueNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuePage {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<IssueNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    id: String,
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    created_at: String,
    closed_at: Option<String>,
    author: Option<Login>,
    #[serde(default)]
    assignees: Connection<Login>,
    #[serde(default)]
    labels: Connection<Label>,
    milestone: Option<Milestone>,
    comments: Option<CommentCount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentCount {
    total_count: u64,
}

impl IssueNode {
    fn into_record(self) -> Result<ItemRecord, SyncError> {
        let content_id = ContentNodeId::new(self.id).ok_or_else(|| SyncError::Decode {
            message: format!("issue #{} has no node id", self.number),
        })?;
        Ok(ItemRecord {
            kind: ItemKind::Issue,
            content_id,
            number: self.number,
            title: self.title,
            author: self.author.map(|a| a.login).unwrap_or_default(),
            assignees: self.assignees.iter().map(|a| a.login.clone()).collect(),
            review_decision: None,
            state: LifecycleState::parse(&self.state),
            milestone: self.milestone.map(|m| m.title),
            draft: false,
            labels: self.labels.iter().map(|l| l.name.clone()).collect(),
            created_at: parse_time(&self.created_at, "createdAt")?,
            closed_at: self
                .closed_at
                .as_deref()
                .map(|t| parse_time(t, "closedAt"))
                .transpose()?,
            comment_count: self.comments.map(|c| c.total_count).unwrap_or_default(),
            review_count: 0,
            review_comment_count: 0,
            filtered_review_count: 0,
            filtered_review_comment_count: 0,
        })
    }
}

impl IssueFeed {
    /// Creates a feed over the given client.
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }

    /// Fetches open issues for `repo`, plus closed ones when `include_closed`,
    /// returning at most `limit` of them.
    #[instrument(skip(self), fields(repo = %repo))]
    pub async fn fetch(
        &self,
        repo: &RepositoryId,
        include_closed: bool,
        limit: Option<usize>,
    ) -> Result<Vec<ItemRecord>, SyncError> {
        let states: &[&str] = if include_closed {
            &["OPEN", "CLOSED"]
        } else {
            &["OPEN"]
        };

        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let request = GraphQlRequest::new(with_fields(ISSUES_QUERY))
                .var("owner", repo.owner())
                .var("name", repo.name())
                .var("states", states.to_vec())
                .var("first", ISSUES_PAGE_SIZE)
                .var("cursor", cursor.clone());
            let data: RepositoryData = self.client.query(&request).await?;
            let page = data
                .repository
                .ok_or_else(|| SyncError::Configuration {
                    message: format!("repository {repo} not found"),
                })?
                .issues;

            for node in page.nodes.into_iter().flatten() {
                records.push(node.into_record()?);
            }
            debug!(fetched = records.len(), "issue page");

            let reached_limit = limit.is_some_and(|limit| records.len() >= limit);
            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page && !reached_limit => {
                    cursor = Some(next)
                }
                _ => break,
            }
        }
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// Fetches a single issue by number.
    #[instrument(skip(self), fields(repo = %repo))]
    pub async fn fetch_one(&self, repo: &RepositoryId, number: u64) -> Result<ItemRecord, SyncError> {
        let request = GraphQlRequest::new(with_fields(ISSUE_QUERY))
            .var("owner", repo.owner())
            .var("name", repo.name())
            .var("number", number);
        let data: SingleData = self.client.query(&request).await?;
        data.repository
            .and_then(|r| r.issue)
            .ok_or_else(|| SyncError::Configuration {
                message: format!("issue {repo}#{number} not found"),
            })?
            .into_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closed_issue_record() {
        let node: IssueNode = serde_json::from_value(json!({
            "id": "I_kwDOB",
            "number": 812,
            "title": "panic on import",
            "state": "CLOSED",
            "createdAt": "2024-01-10T08:00:00Z",
            "closedAt": "2024-01-15T08:00:00Z",
            "author": null,
            "assignees": { "nodes": [] },
            "labels": { "nodes": [{ "name": "bug" }] },
            "milestone": { "title": "v3.90.0" },
            "comments": { "totalCount": 4 }
        }))
        .unwrap();

        let record = node.into_record().unwrap();
        assert_eq!(record.kind, ItemKind::Issue);
        assert!(record.state.is_closed());
        assert_eq!(record.author, "");
        assert_eq!(record.milestone.as_deref(), Some("v3.90.0"));
        assert_eq!(record.comment_count, 4);
        assert_eq!(
            record.closed_at.map(|t| t.to_iso_date()).as_deref(),
            Some("2024-01-15")
        );
    }

    #[test]
    fn test_missing_issue_decodes_as_none() {
        let data: SingleData =
            serde_json::from_value(json!({ "repository": { "issue": null } })).unwrap();
        assert!(data.repository.and_then(|r| r.issue).is_none());
    }

    #[test]
    fn test_queries_carry_fragment() {
        let query = with_fields(ISSUE_QUERY);
        assert!(query.contains("issue(number: $number) { ...IssueFields }"));
        assert!(query.contains("fragment IssueFields on Issue"));
    }
}
