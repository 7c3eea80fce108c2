//! Event timeline for issues and pull requests.
//!
//! Only label removals and milestone removals can end a waiting period, so
//! only those event types are requested.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use reconcile::{EventKind, EventRecord, EventTimeline, GraphQlRequest, ItemRecord, SyncError};

use crate::client::GithubClient;
use crate::project::PageInfo;
use crate::pulls::{parse_time, Label};

const TIMELINE_PAGE_SIZE: u32 = 100;

const TIMELINE_QUERY: &str = r#"query($id: ID!, $first: Int!, $cursor: String) {
  node(id: $id) {
    ... on PullRequest {
      timelineItems(first: $first, after: $cursor, itemTypes: [UNLABELED_EVENT, DEMILESTONED_EVENT]) {
        pageInfo { hasNextPage endCursor }
        nodes {
          __typename
          ... on UnlabeledEvent { createdAt label { name } }
          ... on DemilestonedEvent { createdAt milestoneTitle }
        }
      }
    }
    ... on Issue {
      timelineItems(first: $first, after: $cursor, itemTypes: [UNLABELED_EVENT, DEMILESTONED_EVENT]) {
        pageInfo { hasNextPage endCursor }
        nodes {
          __typename
          ... on UnlabeledEvent { createdAt label { name } }
          ... on DemilestonedEvent { createdAt milestoneTitle }
        }
      }
    }
  }
}"#;

/// Reads item timelines by content node id.
#[derive(Debug, Clone)]
pub struct GithubTimeline {
    client: GithubClient,
}

#[derive(Debug, Deserialize)]
struct NodeData {
    node: Option<TimelineOwner>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineOwner {
    timeline_items: Option<TimelinePage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelinePage {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<TimelineNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum TimelineNode {
    #[serde(rename_all = "camelCase")]
    UnlabeledEvent {
        created_at: String,
        label: Option<Label>,
    },
    #[serde(rename_all = "camelCase")]
    DemilestonedEvent {
        created_at: String,
        milestone_title: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl TimelineNode {
    fn into_event(self) -> Result<Option<EventRecord>, SyncError> {
        let event = match self {
            TimelineNode::UnlabeledEvent { created_at, label } => EventRecord {
                kind: EventKind::Unlabeled,
                label: label.map(|l| l.name),
                milestone: None,
                created_at: parse_time(&created_at, "createdAt")?,
            },
            TimelineNode::DemilestonedEvent {
                created_at,
                milestone_title,
            } => EventRecord {
                kind: EventKind::Demilestoned,
                label: None,
                milestone: milestone_title,
                created_at: parse_time(&created_at, "createdAt")?,
            },
            TimelineNode::Other => return Ok(None),
        };
        Ok(Some(event))
    }
}

impl GithubTimeline {
    /// Creates a timeline reader over the given client.
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventTimeline for GithubTimeline {
    #[instrument(skip_all, fields(number = record.number, content = %record.content_id))]
    async fn events(&self, record: &ItemRecord) -> Result<Vec<EventRecord>, SyncError> {
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let request = GraphQlRequest::new(TIMELINE_QUERY)
                .var("id", record.content_id.as_str())
                .var("first", TIMELINE_PAGE_SIZE)
                .var("cursor", cursor.clone());
            let data: NodeData = self.client.query(&request).await?;
            let Some(page) = data.node.and_then(|n| n.timeline_items) else {
                break;
            };

            for node in page.nodes.into_iter().flatten() {
                if let Some(event) = node.into_event()? {
                    events.push(event);
                }
            }

            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
        }
        events.sort_by_key(|e| e.created_at);
        debug!(events = events.len(), "timeline fetched");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_event_types() {
        let page: TimelinePage = serde_json::from_value(json!({
            "pageInfo": { "hasNextPage": false, "endCursor": null },
            "nodes": [
                { "__typename": "UnlabeledEvent", "createdAt": "2024-02-01T00:00:00Z", "label": { "name": "waiting-response" } },
                { "__typename": "DemilestonedEvent", "createdAt": "2024-02-03T00:00:00Z", "milestoneTitle": "Blocked" },
                { "__typename": "LabeledEvent" }
            ]
        }))
        .unwrap();

        let events: Vec<_> = page
            .nodes
            .into_iter()
            .flatten()
            .filter_map(|n| n.into_event().unwrap())
            .collect();

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(EventRecord::ends_wait));
        assert_eq!(events[1].kind, EventKind::Demilestoned);
    }
}
