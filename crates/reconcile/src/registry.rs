//! Field population registry.
//!
//! A catalog maps board field names to pure compute functions. Which entries
//! run is decided once per run from the populate and skip lists:
//!
//! - a non-empty populate list is taken verbatim, unknown names included;
//!   they fail later at compute time with [`UnknownField`];
//! - otherwise every catalog entry not named in the skip list is active.
//!
//! Callers reject runs that set both lists before reaching the registry.
//!
//! A compute function returning `None` means "omit this field": the update is
//! dropped rather than written as zero or an empty string.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use tracing::warn;

use crate::{
    Classification, ClassificationContext, FieldUpdate, FieldValue, ItemKind, UnknownField,
    ValueKind, STATUS_FIELD,
};

/// Everything a field compute function may read.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    /// Record, board and reference time.
    pub item: ClassificationContext<'a>,
    /// Result of classifying the record.
    pub classification: &'a Classification,
}

type ComputeFn = fn(&FieldContext<'_>) -> Option<FieldValue>;

/// One computable board field.
#[derive(Clone, Copy)]
pub struct FieldDefinition {
    /// Board field name.
    pub name: &'static str,
    /// Value kind written to the board.
    pub kind: ValueKind,
    compute: ComputeFn,
}

impl FieldDefinition {
    const fn new(name: &'static str, kind: ValueKind, compute: ComputeFn) -> Self {
        Self {
            name,
            kind,
            compute,
        }
    }

    /// Computes the value, or `None` when the field should be omitted.
    pub fn compute(&self, ctx: &FieldContext<'_>) -> Option<FieldValue> {
        (self.compute)(ctx)
    }
}

impl std::fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Immutable name → definition map.
#[derive(Debug)]
pub struct FieldCatalog {
    entries: BTreeMap<&'static str, FieldDefinition>,
}

static PULL_REQUEST_CATALOG: LazyLock<FieldCatalog> = LazyLock::new(|| {
    FieldCatalog::from_definitions([
        FieldDefinition::new("PR#", ValueKind::Number, |c| {
            Some(c.item.record.number.into())
        }),
        FieldDefinition::new(STATUS_FIELD, ValueKind::SingleSelect, status_option),
        FieldDefinition::new("User", ValueKind::Text, author),
        FieldDefinition::new("Open Days", ValueKind::Number, |c| {
            Some(c.classification.days_open.into())
        }),
        FieldDefinition::new("Waiting Days", ValueKind::Number, |c| {
            Some(c.classification.days_waiting.into())
        }),
        FieldDefinition::new("Comment Count", ValueKind::Number, |c| {
            Some(c.item.record.comment_count.into())
        }),
        FieldDefinition::new("Review Count", ValueKind::Number, |c| {
            Some(c.item.record.review_count.into())
        }),
        FieldDefinition::new("Review Comment Count", ValueKind::Number, |c| {
            Some(c.item.record.review_comment_count.into())
        }),
        FieldDefinition::new("Created At", ValueKind::Date, created_at),
        FieldDefinition::new("Closed At", ValueKind::Date, closed_at),
        FieldDefinition::new("Filtered Review Count", ValueKind::Number, |c| {
            let record = c.item.record;
            (record.filtered_review_count > 0).then(|| record.filtered_review_count.into())
        }),
        FieldDefinition::new("Filtered Review Comment Count", ValueKind::Number, |c| {
            let record = c.item.record;
            (record.filtered_review_count > 0).then(|| record.filtered_review_comment_count.into())
        }),
    ])
});

static ISSUE_CATALOG: LazyLock<FieldCatalog> = LazyLock::new(|| {
    FieldCatalog::from_definitions([
        FieldDefinition::new("Issue#", ValueKind::Text, |c| {
            Some(FieldValue::String(c.item.record.number.to_string()))
        }),
        FieldDefinition::new(STATUS_FIELD, ValueKind::SingleSelect, status_option),
        FieldDefinition::new("User", ValueKind::Text, author),
        FieldDefinition::new("Age", ValueKind::Number, |c| {
            Some(c.classification.days_open.into())
        }),
        FieldDefinition::new("Created At", ValueKind::Date, created_at),
        FieldDefinition::new("Closed At", ValueKind::Date, closed_at),
    ])
});

fn status_option(c: &FieldContext<'_>) -> Option<FieldValue> {
    let status = c.classification.status.board_name();
    match c.item.board.status_option(status) {
        Some(id) if !id.is_empty() => Some(FieldValue::text(id)),
        _ => {
            warn!(status, "status option not found on board");
            None
        }
    }
}

fn author(c: &FieldContext<'_>) -> Option<FieldValue> {
    Some(FieldValue::text(c.item.record.author.as_str()))
}

fn created_at(c: &FieldContext<'_>) -> Option<FieldValue> {
    Some(FieldValue::String(c.item.record.created_at.to_iso_date()))
}

fn closed_at(c: &FieldContext<'_>) -> Option<FieldValue> {
    let record = c.item.record;
    if record.state.is_open() {
        return None;
    }
    record
        .closed_at
        .map(|at| FieldValue::String(at.to_iso_date()))
}

impl FieldCatalog {
    fn from_definitions(definitions: impl IntoIterator<Item = FieldDefinition>) -> Self {
        Self {
            entries: definitions.into_iter().map(|d| (d.name, d)).collect(),
        }
    }

    /// Fields written for pull requests.
    pub fn pull_requests() -> &'static FieldCatalog {
        &PULL_REQUEST_CATALOG
    }

    /// Fields written for issues.
    pub fn issues() -> &'static FieldCatalog {
        &ISSUE_CATALOG
    }

    /// Catalog for the given record kind.
    pub fn for_kind(kind: ItemKind) -> &'static FieldCatalog {
        match kind {
            ItemKind::PullRequest => Self::pull_requests(),
            ItemKind::Issue => Self::issues(),
        }
    }

    /// All definitions, ordered by name.
    pub fn definitions(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.entries.values()
    }

    /// Looks up one definition.
    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.entries.get(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decides which field names are active for this run.
    pub fn resolve_active_fields(&self, populate: &[String], skip: &[String]) -> Vec<String> {
        if !populate.is_empty() {
            return populate.to_vec();
        }
        self.entries
            .keys()
            .filter(|name| !skip.iter().any(|s| s == *name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Computes one field.
    pub fn compute(
        &self,
        name: &str,
        ctx: &FieldContext<'_>,
    ) -> Result<Option<FieldValue>, UnknownField> {
        self.get(name)
            .map(|definition| definition.compute(ctx))
            .ok_or_else(|| UnknownField {
                name: name.to_string(),
            })
    }

    /// Computes every active field and returns the updates to write.
    ///
    /// Omitted values are dropped. Field ids come from the board, so a field
    /// the board lacks yields an update with an empty id that the mutation
    /// builder rejects.
    pub fn build_updates(
        &self,
        active: &[String],
        ctx: &FieldContext<'_>,
    ) -> Result<Vec<FieldUpdate>, UnknownField> {
        let mut updates = Vec::with_capacity(active.len());
        for name in active {
            let Some(definition) = self.get(name) else {
                return Err(UnknownField { name: name.clone() });
            };
            if let Some(value) = definition.compute(ctx) {
                updates.push(FieldUpdate {
                    field: ctx.item.board.descriptor(definition.name, definition.kind),
                    value,
                });
            }
        }
        Ok(updates)
    }
}
