//! Pull request feed.
//!
//! Pages through a repository's pull requests, newest first, and flattens each
//! into an [`ItemRecord`]. Reviews left as `COMMENTED` or `PENDING` do not
//! count; every other review adds to the review and review-comment totals,
//! and to the filtered totals when its author is one of the configured
//! reviewers.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::{debug, instrument};

use reconcile::{
    ContentNodeId, GraphQlRequest, ItemKind, ItemRecord, LifecycleState, RepositoryId,
    ReviewDecision, SyncError, Timestamp,
};

use crate::client::GithubClient;
use crate::project::PageInfo;

/// Pull requests fetched per page.
pub const PULLS_PAGE_SIZE: u32 = 40;

const PULL_FIELDS: &str = r#"fragment PullFields on PullRequest {
  id
  number
  title
  state
  reviewDecision
  createdAt
  closedAt
  isDraft
  totalCommentsCount
  author { login }
  assignees(first: 10) { nodes { login } }
  labels(first: 100) { nodes { name } }
  milestone { title }
  reviews(first: 100) {
    nodes {
      state
      author { login }
      comments { totalCount }
    }
  }
}"#;

const PULLS_QUERY: &str = r#"query($owner: String!, $name: String!, $states: [PullRequestState!], $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequests(first: $first, after: $cursor, states: $states, orderBy: {field: CREATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes { ...PullFields }
    }
  }
}"#;

const PULL_QUERY: &str = r#"query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) { ...PullFields }
  }
}"#;

fn with_fields(query: &str) -> String {
    format!("{query}\n{PULL_FIELDS}")
}

/// Which pull requests to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestQuery {
    /// Also fetch closed and merged pull requests.
    pub include_closed: bool,
    /// Return at most this many; `None` fetches everything.
    pub limit: Option<usize>,
    /// Logins whose reviews feed the filtered counts.
    pub reviewers: BTreeSet<String>,
}

impl PullRequestQuery {
    /// GraphQL `PullRequestState` values to request.
    pub fn states(&self) -> Vec<&'static str> {
        if self.include_closed {
            vec!["OPEN", "CLOSED", "MERGED"]
        } else {
            vec!["OPEN"]
        }
    }
}

/// Reads pull requests from GitHub.
#[derive(Debug, Clone)]
pub struct PullRequestFeed {
    client: GithubClient,
}

#[derive(Debug, Deserialize)]
struct RepositoryData {
    repository: Option<RepositoryPulls>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryPulls {
    pull_requests: PullPage,
}

#[derive(Debug, Deserialize)]
struct SingleData {
    repository: Option<SinglePull>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SinglePull {
    pull_request: Option<PullNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullPage {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<PullNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullNode {
    id: String,
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    review_decision: Option<String>,
    created_at: String,
    closed_at: Option<String>,
    #[serde(default)]
    is_draft: bool,
    #[serde(default)]
    total_comments_count: u64,
    author: Option<Login>,
    #[serde(default)]
    assignees: Connection<Login>,
    #[serde(default)]
    labels: Connection<Label>,
    milestone: Option<Milestone>,
    #[serde(default)]
    reviews: Connection<Review>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Connection<T> {
    #[serde(default)]
    pub(crate) nodes: Vec<Option<T>>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T> Connection<T> {
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter().flatten()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Login {
    pub(crate) login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Label {
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Milestone {
    pub(crate) title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Review {
    state: String,
    author: Option<Login>,
    comments: TotalCount,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    #[serde(default)]
    total_count: u64,
}

pub(crate) fn parse_time(value: &str, field: &str) -> Result<Timestamp, SyncError> {
    Timestamp::parse_rfc3339(value).ok_or_else(|| SyncError::Decode {
        message: format!("invalid {field} timestamp: {value:?}"),
    })
}

impl PullNode {
    pub(crate) fn into_record(self, reviewers: &BTreeSet<String>) -> Result<ItemRecord, SyncError> {
        let content_id = ContentNodeId::new(self.id).ok_or_else(|| SyncError::Decode {
            message: format!("pull request #{} has no node id", self.number),
        })?;

        let mut review_count = 0;
        let mut review_comment_count = 0;
        let mut filtered_review_count = 0;
        let mut filtered_review_comment_count = 0;
        for review in self.reviews.iter() {
            if matches!(review.state.as_str(), "COMMENTED" | "PENDING") {
                continue;
            }
            review_count += 1;
            review_comment_count += review.comments.total_count;
            let by_reviewer = review
                .author
                .as_ref()
                .is_some_and(|a| reviewers.contains(&a.login));
            if by_reviewer {
                filtered_review_count += 1;
                filtered_review_comment_count += review.comments.total_count;
            }
        }

        Ok(ItemRecord {
            kind: ItemKind::PullRequest,
            content_id,
            number: self.number,
            title: self.title,
            author: self.author.map(|a| a.login).unwrap_or_default(),
            assignees: self.assignees.iter().map(|a| a.login.clone()).collect(),
            review_decision: self.review_decision.as_deref().and_then(ReviewDecision::parse),
            state: LifecycleState::parse(&self.state),
            milestone: self.milestone.map(|m| m.title),
            draft: self.is_draft,
            labels: self.labels.iter().map(|l| l.name.clone()).collect(),
            created_at: parse_time(&self.created_at, "createdAt")?,
            closed_at: self
                .closed_at
                .as_deref()
                .map(|t| parse_time(t, "closedAt"))
                .transpose()?,
            comment_count: self.total_comments_count,
            review_count,
            review_comment_count,
            filtered_review_count,
            filtered_review_comment_count,
        })
    }
}

impl PullRequestFeed {
    /// Creates a feed over the given client.
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }

    /// Fetches pull requests for `repo`.
    #[instrument(skip(self, query), fields(repo = %repo, include_closed = query.include_closed))]
    pub async fn fetch(
        &self,
        repo: &RepositoryId,
        query: &PullRequestQuery,
    ) -> Result<Vec<ItemRecord>, SyncError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let request = GraphQlRequest::new(with_fields(PULLS_QUERY))
                .var("owner", repo.owner())
                .var("name", repo.name())
                .var("states", query.states())
                .var("first", PULLS_PAGE_SIZE)
                .var("cursor", cursor.clone());
            let data: RepositoryData = self.client.query(&request).await?;
            let page = data
                .repository
                .ok_or_else(|| SyncError::Configuration {
                    message: format!("repository {repo} not found"),
                })?
                .pull_requests;

            for node in page.nodes.into_iter().flatten() {
                records.push(node.into_record(&query.reviewers)?);
            }
            debug!(fetched = records.len(), "pull request page");

            let reached_limit = query.limit.is_some_and(|limit| records.len() >= limit);
            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page && !reached_limit => {
                    cursor = Some(next)
                }
                _ => break,
            }
        }
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// Fetches a single pull request by number.
    #[instrument(skip(self, reviewers), fields(repo = %repo))]
    pub async fn fetch_one(
        &self,
        repo: &RepositoryId,
        number: u64,
        reviewers: &BTreeSet<String>,
    ) -> Result<ItemRecord, SyncError> {
        let request = GraphQlRequest::new(with_fields(PULL_QUERY))
            .var("owner", repo.owner())
            .var("name", repo.name())
            .var("number", number);
        let data: SingleData = self.client.query(&request).await?;
        data.repository
            .and_then(|r| r.pull_request)
            .ok_or_else(|| SyncError::Configuration {
                message: format!("pull request {repo}#{number} not found"),
            })?
            .into_record(reviewers)
    }
}
