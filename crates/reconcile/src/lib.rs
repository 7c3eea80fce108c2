//! Reconciliation domain for boardsync.
//!
//! This crate holds every rule that decides what a board item should look
//! like: status classification, the field catalogs, the batched field
//! mutation, and per-item orchestration. Infrastructure crates implement the
//! port traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no I/O of its
//! own. It builds requests and hands them to a [`RequestExecutor`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ProjectId`, `ItemId`, `ContentNodeId`, ...) |
//! | [`types`] | `Timestamp`, `ValueKind`, `FieldValue` |
//! | [`errors`] | `SyncError`, `ValidationError`, `UnknownField`, `RetryPolicy` |
//! | [`board`] | Board metadata, field descriptors and updates, item index |
//! | [`record`] | Normalized source records and timeline events |
//! | [`ports`] | `RequestExecutor`, `ProjectBoard`, `EventTimeline` |
//! | [`mutation`] | Batched field mutation builder and writer |
//! | [`classifier`] | Ordered status decision table and waiting-day scan |
//! | [`registry`] | Field catalogs and active-field selection |
//! | [`filters`] | Author, assignee and label filters |
//! | [`engine`] | Per-item sync and run summary |
//! | [`ticket`] | Tracker tickets and the board fields they fill |

pub mod board;
pub mod classifier;
pub mod engine;
pub mod errors;
pub mod filters;
pub mod identifiers;
pub mod mutation;
pub mod ports;
pub mod record;
pub mod registry;
pub mod ticket;
pub mod types;

pub use board::{
    BoardField, BoardItem, BoardMetadata, FieldDescriptor, FieldUpdate, ItemIndex, STATUS_FIELD,
};
pub use classifier::{
    classify, classify_with_events, days_open, tentative_status, Classification,
    ClassificationContext, StatusLabel,
};
pub use engine::{ItemOutcome, ItemSynchronizer, SyncSummary};
pub use errors::{RetryPolicy, SyncError, UnknownField, ValidationError};
pub use filters::{FilterSet, LabelCondition, LabelMatch, RecordFilter};
pub use identifiers::{ContentNodeId, ItemId, ProjectId, RepositoryId, SyncRunId};
pub use mutation::{
    build_update_mutation, update_item_fields, validate_updates, FieldMutationBuilder,
};
pub use ports::{EventTimeline, GraphQlRequest, ProjectBoard, RequestExecutor};
pub use record::{
    EventKind, EventRecord, ItemKind, ItemRecord, LifecycleState, ReviewDecision,
    BLOCKED_MILESTONE, WAITING_RESPONSE_LABEL,
};
pub use registry::{FieldCatalog, FieldContext, FieldDefinition};
pub use ticket::{ticket_updates, TicketRecord, TICKET_FIELDS};
pub use types::{FieldValue, Timestamp, ValueKind};
