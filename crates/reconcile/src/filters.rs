//! Record filters applied between the source feed and the engine.
//!
//! A label condition prefixed with `-` is negated: it holds when the label is
//! absent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ItemRecord;

/// How a set of label conditions is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    /// At least one condition holds.
    Any,
    /// Every condition holds.
    All,
}

/// A single label condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCondition {
    /// Label name without the `-` prefix.
    pub label: String,
    /// Holds when the label is absent.
    pub negated: bool,
}

impl LabelCondition {
    /// Parses `name` or `-name`.
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix('-') {
            Some(label) => Self {
                label: label.to_string(),
                negated: true,
            },
            None => Self {
                label: value.to_string(),
                negated: false,
            },
        }
    }

    /// Evaluates the condition against a label set.
    pub fn holds(&self, labels: &BTreeSet<String>) -> bool {
        labels.contains(&self.label) != self.negated
    }
}

/// One configured filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordFilter {
    /// Passes records authored by one of the logins.
    Authors(BTreeSet<String>),
    /// Passes records assigned to one of the logins.
    Assignees(BTreeSet<String>),
    /// Label conditions combined with `Any` or `All`.
    Labels {
        /// Combination rule.
        mode: LabelMatch,
        /// Conditions to evaluate.
        conditions: Vec<LabelCondition>,
    },
}

impl RecordFilter {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            RecordFilter::Authors(_) => "authors",
            RecordFilter::Assignees(_) => "assignees",
            RecordFilter::Labels {
                mode: LabelMatch::Any,
                ..
            } => "labels or",
            RecordFilter::Labels {
                mode: LabelMatch::All,
                ..
            } => "labels and",
        }
    }

    /// Returns `true` if the record passes this filter.
    pub fn matches(&self, record: &ItemRecord) -> bool {
        match self {
            RecordFilter::Authors(logins) => logins.contains(&record.author),
            RecordFilter::Assignees(logins) => {
                record.assignees.iter().any(|a| logins.contains(a))
            }
            RecordFilter::Labels { mode, conditions } => match mode {
                LabelMatch::Any => conditions.iter().any(|c| c.holds(&record.labels)),
                LabelMatch::All => conditions.iter().all(|c| c.holds(&record.labels)),
            },
        }
    }
}

/// The filters configured for a run.
///
/// A record is kept when any filter passes it. With no filters every record is
/// kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    filters: Vec<RecordFilter>,
}

impl FilterSet {
    /// Builds the set from raw flag values. Empty lists add no filter.
    pub fn from_lists(
        authors: &[String],
        assignees: &[String],
        labels_or: &[String],
        labels_and: &[String],
    ) -> Self {
        let mut filters = Vec::new();
        if !authors.is_empty() {
            filters.push(RecordFilter::Authors(authors.iter().cloned().collect()));
        }
        if !assignees.is_empty() {
            filters.push(RecordFilter::Assignees(assignees.iter().cloned().collect()));
        }
        for (mode, labels) in [(LabelMatch::Any, labels_or), (LabelMatch::All, labels_and)] {
            if !labels.is_empty() {
                filters.push(RecordFilter::Labels {
                    mode,
                    conditions: labels.iter().map(|l| LabelCondition::parse(l)).collect(),
                });
            }
        }
        Self { filters }
    }

    /// Returns `true` if no filters are configured.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Configured filters.
    pub fn filters(&self) -> &[RecordFilter] {
        &self.filters
    }

    /// Returns `true` if the record should be synced. An empty set accepts
    /// every record, for issues and pull requests alike.
    pub fn accepts(&self, record: &ItemRecord) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(record))
    }

    /// Keeps the accepted records.
    pub fn apply(&self, records: Vec<ItemRecord>) -> Vec<ItemRecord> {
        records.into_iter().filter(|r| self.accepts(r)).collect()
    }
}
