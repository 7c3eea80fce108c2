//! Organization Projects (v2) board adapter.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use reconcile::{
    update_item_fields, BoardField, BoardItem, BoardMetadata, ContentNodeId, FieldUpdate,
    GraphQlRequest, ItemId, ProjectBoard, ProjectId, SyncError, STATUS_FIELD,
};

use crate::client::GithubClient;

const ITEMS_PAGE_SIZE: u32 = 100;

const METADATA_QUERY: &str = r#"query($org: String!, $number: Int!) {
  organization(login: $org) {
    projectV2(number: $number) {
      id
      fields(first: 40) {
        nodes {
          ... on ProjectV2Field { id name }
          ... on ProjectV2IterationField { id name }
          ... on ProjectV2SingleSelectField { id name options { id name } }
        }
      }
    }
  }
}"#;

const ITEMS_QUERY: &str = r#"query($org: String!, $number: Int!, $first: Int!, $cursor: String) {
  organization(login: $org) {
    projectV2(number: $number) {
      items(first: $first, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          type
          requestType: fieldValueByName(name: "Type") {
            ... on ProjectV2ItemFieldTextValue { text }
          }
          dueDate: fieldValueByName(name: "Due Date") {
            ... on ProjectV2ItemFieldDateValue { date }
          }
          status: fieldValueByName(name: "Status") {
            ... on ProjectV2ItemFieldSingleSelectValue { optionId }
          }
          content {
            ... on Issue { id title url }
            ... on PullRequest { id title url }
            ... on DraftIssue { id title }
          }
        }
      }
    }
  }
}"#;

const ADD_ITEM_MUTATION: &str = r#"mutation($project: ID!, $content: ID!) {
  addProjectV2ItemById(input: {projectId: $project, contentId: $content}) {
    item { id }
  }
}"#;

/// A board owned by a GitHub organization, addressed by number.
#[derive(Debug, Clone)]
pub struct GithubProjectBoard {
    client: GithubClient,
    owner: String,
    number: u64,
}

impl GithubProjectBoard {
    /// Creates an adapter for `owner`'s project `number`.
    pub fn new(client: GithubClient, owner: impl Into<String>, number: u64) -> Self {
        Self {
            client,
            owner: owner.into(),
            number,
        }
    }

    /// Organization login.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Project number.
    pub fn number(&self) -> u64 {
        self.number
    }

    fn not_found(&self) -> SyncError {
        SyncError::Configuration {
            message: format!("project {}/{} not found", self.owner, self.number),
        }
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OrganizationData<P> {
    organization: Option<ProjectWrapper<P>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectWrapper<P> {
    project_v2: Option<P>,
}

#[derive(Debug, Deserialize)]
struct MetadataProject {
    id: String,
    fields: Nodes<FieldNode>,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    #[serde(default)]
    nodes: Vec<Option<T>>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldNode {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    options: Vec<OptionNode>,
}

#[derive(Debug, Deserialize)]
struct OptionNode {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ItemsProject {
    items: ItemPage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemPage {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<ItemNode>>,
}

/// Relay-style pagination cursor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    pub(crate) has_next_page: bool,
    pub(crate) end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemNode {
    id: String,
    #[serde(rename = "type", default)]
    item_type: String,
    request_type: Option<TextValue>,
    due_date: Option<DateValue>,
    status: Option<OptionValue>,
    content: Option<ContentNode>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateValue {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionValue {
    option_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentNode {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemData {
    add_project_v2_item_by_id: AddItemPayload,
}

#[derive(Debug, Deserialize)]
struct AddItemPayload {
    item: IdNode,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

impl MetadataProject {
    fn into_metadata(self) -> Option<BoardMetadata> {
        let project_id = ProjectId::new(self.id)?;
        let fields = self
            .fields
            .nodes
            .into_iter()
            .flatten()
            .filter(|f| !f.id.is_empty())
            .map(|f| BoardField {
                id: f.id,
                name: f.name,
                options: f.options.into_iter().map(|o| (o.name, o.id)).collect(),
            })
            .collect();
        Some(BoardMetadata { project_id, fields })
    }
}

impl ItemNode {
    fn into_item(self) -> Option<BoardItem> {
        let id = ItemId::new(self.id)?;
        let content = self.content.unwrap_or_default();
        Some(BoardItem {
            id,
            item_type: self.item_type,
            content_id: ContentNodeId::new(content.id),
            title: content.title,
            url: content.url,
            request_type: self.request_type.and_then(|v| v.text),
            due_date: self.due_date.and_then(|v| v.date),
            status_option: self.status.and_then(|v| v.option_id),
        })
    }
}

#[async_trait]
impl ProjectBoard for GithubProjectBoard {
    #[instrument(skip(self), fields(owner = %self.owner, number = self.number))]
    async fn load_metadata(&self) -> Result<BoardMetadata, SyncError> {
        let request = GraphQlRequest::new(METADATA_QUERY)
            .var("org", self.owner.as_str())
            .var("number", self.number);
        let data: OrganizationData<MetadataProject> = self.client.query(&request).await?;

        let metadata = data
            .organization
            .and_then(|o| o.project_v2)
            .and_then(MetadataProject::into_metadata)
            .ok_or_else(|| self.not_found())?;

        debug!(
            project = %metadata.project_id,
            fields = metadata.fields.len(),
            status_options = metadata
                .field(STATUS_FIELD)
                .map(|f| f.options.len())
                .unwrap_or_default(),
            "loaded board metadata"
        );
        Ok(metadata)
    }

    #[instrument(skip_all, fields(owner = %self.owner, number = self.number))]
    async fn list_items(&self, _board: &BoardMetadata) -> Result<Vec<BoardItem>, SyncError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let request = GraphQlRequest::new(ITEMS_QUERY)
                .var("org", self.owner.as_str())
                .var("number", self.number)
                .var("first", ITEMS_PAGE_SIZE)
                .var("cursor", cursor.clone());
            let data: OrganizationData<ItemsProject> = self.client.query(&request).await?;
            let page = data
                .organization
                .and_then(|o| o.project_v2)
                .ok_or_else(|| self.not_found())?
                .items;

            items.extend(page.nodes.into_iter().flatten().filter_map(ItemNode::into_item));

            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
        }
        debug!(items = items.len(), "listed board items");
        Ok(items)
    }

    #[instrument(skip(self, board), fields(project = %board.project_id))]
    async fn add_item(
        &self,
        board: &BoardMetadata,
        content: &ContentNodeId,
    ) -> Result<ItemId, SyncError> {
        let request = GraphQlRequest::new(ADD_ITEM_MUTATION)
            .var("project", board.project_id.as_str())
            .var("content", content.as_str());
        let data: AddItemData = self.client.query(&request).await?;
        ItemId::new(data.add_project_v2_item_by_id.item.id).ok_or_else(|| SyncError::Decode {
            message: "addProjectV2ItemById returned an empty item id".into(),
        })
    }

    async fn update_item(
        &self,
        board: &BoardMetadata,
        item: &ItemId,
        updates: &[FieldUpdate],
    ) -> Result<(), SyncError> {
        update_item_fields(&self.client, &board.project_id, item, updates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_decoding_skips_unknown_field_types() {
        let data: OrganizationData<MetadataProject> = serde_json::from_value(json!({
            "organization": { "projectV2": {
                "id": "PVT_kw",
                "fields": { "nodes": [
                    { "id": "PVTF_title", "name": "Title" },
                    {},
                    { "id": "PVTSSF_status", "name": "Status", "options": [
                        { "id": "f75ad846", "name": "Waiting for Review" },
                        { "id": "47fc9ee4", "name": "Approved" }
                    ]}
                ]}
            }}
        }))
        .unwrap();

        let metadata = data
            .organization
            .and_then(|o| o.project_v2)
            .and_then(MetadataProject::into_metadata)
            .unwrap();

        assert_eq!(metadata.project_id.as_str(), "PVT_kw");
        assert_eq!(metadata.fields.len(), 2);
        assert_eq!(metadata.status_option("Approved"), Some("47fc9ee4"));
    }

    #[test]
    fn test_item_decoding_handles_drafts_and_missing_values() {
        let page: ItemPage = serde_json::from_value(json!({
            "pageInfo": { "hasNextPage": false, "endCursor": null },
            "nodes": [
                {
                    "id": "PVTI_1", "type": "PULL_REQUEST",
                    "requestType": { "text": "Bug" },
                    "dueDate": { "date": "2024-07-01" },
                    "status": null,
                    "content": { "id": "PR_1", "title": "Fix", "url": "https://github.com/o/r/pull/1" }
                },
                {
                    "id": "PVTI_2", "type": "DRAFT_ISSUE",
                    "requestType": null, "dueDate": null, "status": { "optionId": "opt" },
                    "content": { "id": "DI_2", "title": "Idea" }
                }
            ]
        }))
        .unwrap();

        let items: Vec<_> = page.nodes.into_iter().flatten().filter_map(ItemNode::into_item).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].request_type.as_deref(), Some("Bug"));
        assert_eq!(items[0].due_date.as_deref(), Some("2024-07-01"));
        assert_eq!(items[1].url, "");
        assert_eq!(items[1].status_option.as_deref(), Some("opt"));
    }
}
