//! Board-side data model: field metadata, field updates, and board items.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{ContentNodeId, FieldValue, ItemId, ProjectId, ValueKind};

/// Name of the single-select field that holds an item's status.
pub const STATUS_FIELD: &str = "Status";

/// Identifies one typed slot on a board item.
///
/// The field id is resolved from [`BoardMetadata`] once per run. It is kept as
/// a plain string because a name the board does not know resolves to an empty
/// id, which the mutation builder rejects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name as it appears on the board (e.g. `"Open Days"`).
    pub name: String,
    /// GraphQL node id of the field.
    pub field_id: String,
    /// Value kind of the field.
    pub kind: ValueKind,
}

/// A single field write for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    /// The field being written.
    pub field: FieldDescriptor,
    /// The value to write.
    pub value: FieldValue,
}

impl FieldUpdate {
    /// Creates an update from its parts.
    pub fn new(
        name: impl Into<String>,
        field_id: impl Into<String>,
        kind: ValueKind,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            field: FieldDescriptor {
                name: name.into(),
                field_id: field_id.into(),
                kind,
            },
            value: value.into(),
        }
    }
}

/// One field as declared on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardField {
    /// GraphQL node id of the field.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Option name → option id, for single-select fields. Empty otherwise.
    pub options: BTreeMap<String, String>,
}

/// Board layout loaded once per run.
///
/// Treated as immutable for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMetadata {
    /// The board's node id.
    pub project_id: ProjectId,
    /// All fields declared on the board, in board order.
    pub fields: Vec<BoardField>,
}

impl BoardMetadata {
    /// Looks up a field by exact name.
    pub fn field(&self, name: &str) -> Option<&BoardField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the remote id of the named field, or an empty string when the
    /// board has no such field.
    pub fn field_id(&self, name: &str) -> &str {
        self.field(name).map(|f| f.id.as_str()).unwrap_or_default()
    }

    /// Option id of the named single-select option on the field.
    pub fn option_id(&self, field: &str, option: &str) -> Option<&str> {
        self.field(field)
            .and_then(|f| f.options.get(option))
            .map(String::as_str)
    }

    /// Option id of a status name (e.g. `"In Progress"`).
    pub fn status_option(&self, status: &str) -> Option<&str> {
        self.option_id(STATUS_FIELD, status)
    }

    /// Builds a descriptor for the named field.
    pub fn descriptor(&self, name: &str, kind: ValueKind) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            field_id: self.field_id(name).to_string(),
            kind,
        }
    }
}

/// A row currently on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardItem {
    /// The board's id for the row.
    pub id: ItemId,
    /// Content type reported by the board (`ISSUE`, `PULL_REQUEST`, `DRAFT_ISSUE`).
    pub item_type: String,
    /// Node id of the underlying content, when it is not a redacted item.
    pub content_id: Option<ContentNodeId>,
    /// Title of the underlying content.
    pub title: String,
    /// URL of the underlying content. Empty for draft issues.
    pub url: String,
    /// Value of the `Type` text field.
    pub request_type: Option<String>,
    /// Value of the `Due Date` date field.
    pub due_date: Option<String>,
    /// Option id currently selected in the `Status` field.
    pub status_option: Option<String>,
}

/// Content node id → board item id, built from the board's current items.
///
/// Used by orchestration to decide between adding and updating an item.
#[derive(Debug, Clone, Default)]
pub struct ItemIndex {
    by_content: HashMap<ContentNodeId, ItemId>,
}

impl ItemIndex {
    /// Indexes the given board items. Items without content are ignored.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a BoardItem>) -> Self {
        let by_content = items
            .into_iter()
            .filter_map(|item| {
                item.content_id
                    .as_ref()
                    .map(|content| (content.clone(), item.id.clone()))
            })
            .collect();
        Self { by_content }
    }

    /// Returns the board item for the content, if it is already on the board.
    pub fn get(&self, content: &ContentNodeId) -> Option<&ItemId> {
        self.by_content.get(content)
    }

    /// Records a newly added item.
    pub fn insert(&mut self, content: ContentNodeId, item: ItemId) {
        self.by_content.insert(content, item);
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.by_content.len()
    }

    /// Returns `true` if no items are indexed.
    pub fn is_empty(&self) -> bool {
        self.by_content.is_empty()
    }
}
