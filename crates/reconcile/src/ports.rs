//! Port traits implemented by infrastructure crates.
//!
//! The domain defines *what* it needs from the outside world; the `github`
//! crate defines *how* to supply it. Tests supply in-memory fakes.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    BoardItem, BoardMetadata, ContentNodeId, EventRecord, FieldUpdate, ItemId, ItemRecord,
    SyncError,
};

/// A GraphQL document plus its variables, ready to post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlRequest {
    /// The query or mutation document.
    pub query: String,
    /// Variable values keyed by name (without the leading `$`).
    pub variables: Map<String, Value>,
}

impl GraphQlRequest {
    /// Creates a request with no variables.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
        }
    }

    /// Adds a variable, replacing any previous value under the same name.
    pub fn var(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }
}

/// Sends requests to the remote API.
///
/// Implementations classify failures and retry rate-limited or transient
/// ones; every other failure is returned unmodified on the first attempt.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Executes `request` and returns the `data` member of the response.
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, SyncError>;
}

/// Read and write access to one project board.
#[async_trait]
pub trait ProjectBoard: Send + Sync {
    /// Loads the board id, fields, and single-select options.
    async fn load_metadata(&self) -> Result<BoardMetadata, SyncError>;

    /// Lists every item currently on the board.
    async fn list_items(&self, board: &BoardMetadata) -> Result<Vec<BoardItem>, SyncError>;

    /// Adds content to the board and returns the new item's id.
    async fn add_item(
        &self,
        board: &BoardMetadata,
        content: &ContentNodeId,
    ) -> Result<ItemId, SyncError>;

    /// Writes all `updates` to `item` in a single request.
    async fn update_item(
        &self,
        board: &BoardMetadata,
        item: &ItemId,
        updates: &[FieldUpdate],
    ) -> Result<(), SyncError>;
}

/// Supplies an item's event history.
#[async_trait]
pub trait EventTimeline: Send + Sync {
    /// Returns the item's label and milestone events in chronological order.
    async fn events(&self, record: &ItemRecord) -> Result<Vec<EventRecord>, SyncError>;
}
