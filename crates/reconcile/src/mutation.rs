//! Batched field writes.
//!
//! Any number of field updates for one item become a single GraphQL mutation
//! with one aliased `updateProjectV2ItemFieldValue` call per field. All calls
//! share the `$project` and `$item` variables; each field adds a `_field` and a
//! `_value` variable. N field writes therefore cost one round trip.
//!
//! | Kind | Declared value type | Value wrapper |
//! |---|---|---|
//! | Text | `String!` | `{ text: $v }` |
//! | Number | `Float!` | `{ number: $v }` |
//! | Date | `Date!` | `{ date: $v }` |
//! | SingleSelect | `String!` | `{ singleSelectOptionId: $v }` |
//!
//! Every update is validated before anything is built; one bad update rejects
//! the batch and no request is sent.

use serde_json::{Map, Number, Value};
use tracing::{debug, instrument};

use crate::{
    FieldUpdate, FieldValue, GraphQlRequest, ItemId, ProjectId, RequestExecutor, SyncError,
    ValidationError, ValueKind,
};

/// Largest integer an `f64` represents exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Accumulates field writes for one item into a single mutation.
#[derive(Debug, Clone)]
pub struct FieldMutationBuilder {
    var_defs: Vec<String>,
    calls: Vec<String>,
    variables: Map<String, Value>,
}

impl FieldMutationBuilder {
    /// Starts a mutation targeting `item` on `project`.
    pub fn new(project: &ProjectId, item: &ItemId) -> Self {
        let mut variables = Map::new();
        variables.insert("project".into(), Value::String(project.to_string()));
        variables.insert("item".into(), Value::String(item.to_string()));
        Self {
            var_defs: vec!["$project: ID!".into(), "$item: ID!".into()],
            calls: Vec::new(),
            variables,
        }
    }

    /// Number of field writes accumulated so far.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Returns `true` if no field writes have been added.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Adds one field write.
    ///
    /// On error the builder is left unchanged.
    pub fn push(&mut self, update: &FieldUpdate) -> Result<&mut Self, ValidationError> {
        let index = self.calls.len();
        let value = wire_value(index, update)?;
        let kind = update.field.kind;

        let field_var = format!("f{index}_field");
        let value_var = format!("f{index}_value");
        let alias = format!("set_{}_{index}", alias_slug(&update.field.name));

        self.var_defs.push(format!("${field_var}: ID!"));
        self.var_defs
            .push(format!("${value_var}: {}", kind.graphql_type()));
        self.variables.insert(
            field_var.clone(),
            Value::String(update.field.field_id.clone()),
        );
        self.variables.insert(value_var.clone(), value);
        self.calls.push(format!(
            "  {alias}: updateProjectV2ItemFieldValue(input: {{projectId: $project, itemId: $item, fieldId: ${field_var}, value: {{{}: ${value_var}}}}}) {{\n    projectV2Item {{ id }}\n  }}",
            kind.wrapper_key()
        ));
        Ok(self)
    }

    /// Assembles the mutation document.
    pub fn build(self) -> Result<GraphQlRequest, ValidationError> {
        if self.calls.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        let query = format!(
            "mutation UpdateItemFields({}) {{\n{}\n}}",
            self.var_defs.join(", "),
            self.calls.join("\n")
        );
        Ok(GraphQlRequest {
            query,
            variables: self.variables,
        })
    }
}

/// Checks every update in the batch without building anything.
pub fn validate_updates(updates: &[FieldUpdate]) -> Result<(), ValidationError> {
    if updates.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    for (index, update) in updates.iter().enumerate() {
        wire_value(index, update)?;
    }
    Ok(())
}

/// Validates `updates` and builds the batched mutation for `item`.
pub fn build_update_mutation(
    project: &ProjectId,
    item: &ItemId,
    updates: &[FieldUpdate],
) -> Result<GraphQlRequest, ValidationError> {
    validate_updates(updates)?;
    let mut builder = FieldMutationBuilder::new(project, item);
    for update in updates {
        builder.push(update)?;
    }
    builder.build()
}

/// Writes `updates` to `item` with exactly one executor call.
///
/// An empty batch is a no-op. Invalid batches fail before the executor is
/// touched. Remote rejections come back as [`SyncError::Request`] carrying the
/// raw payload.
#[instrument(skip(executor, updates), fields(project = %project, item = %item, fields = updates.len()))]
pub async fn update_item_fields<E>(
    executor: &E,
    project: &ProjectId,
    item: &ItemId,
    updates: &[FieldUpdate],
) -> Result<(), SyncError>
where
    E: RequestExecutor + ?Sized,
{
    if updates.is_empty() {
        debug!("no fields to update");
        return Ok(());
    }

    let request = build_update_mutation(project, item, updates)?;
    debug!(query = %request.query, "submitting field mutation");

    executor.execute(&request).await.map_err(|err| match err {
        SyncError::Request { message, payload } => SyncError::Request {
            message: format!("error updating project item: {message}"),
            payload,
        },
        other => other,
    })?;
    Ok(())
}

/// Validates one update and converts its value to JSON.
fn wire_value(index: usize, update: &FieldUpdate) -> Result<Value, ValidationError> {
    let field = &update.field;
    if field.name.is_empty() {
        return Err(ValidationError::EmptyFieldName { index });
    }
    if field.field_id.is_empty() {
        return Err(ValidationError::EmptyFieldId {
            field: field.name.clone(),
        });
    }
    if !update.value.fits(field.kind) {
        return Err(ValidationError::KindMismatch {
            field: field.name.clone(),
            expected: field.kind,
        });
    }

    match (&update.value, field.kind) {
        (FieldValue::Number(n), ValueKind::Number) => number_value(*n).ok_or_else(|| {
            ValidationError::NonFiniteNumber {
                field: field.name.clone(),
            }
        }),
        (FieldValue::String(s), _) => Ok(Value::String(s.clone())),
        (FieldValue::Number(_), _) => Err(ValidationError::KindMismatch {
            field: field.name.clone(),
            expected: field.kind,
        }),
    }
}

/// Integral values are sent without a fractional part.
fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INTEGER {
        return Some(Value::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number)
}

/// GraphQL names allow `[_A-Za-z0-9]`; everything else becomes `_`.
fn alias_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = slug.trim_matches('_');
    if trimmed.is_empty() {
        "field".to_string()
    } else {
        trimmed.to_string()
    }
}
