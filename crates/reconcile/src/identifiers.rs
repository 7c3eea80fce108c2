//! Newtype domain identifiers.
//!
//! Every remote identity the engine handles is an opaque string assigned by
//! GitHub. Wrapping each one in a distinct newtype prevents accidentally
//! passing a board [`ItemId`] where a [`ContentNodeId`] is
//! expected, even though both are node-id strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: remote node ids
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a Projects (v2) board by its GraphQL node id (`PVT_...`).
    ProjectId
}

string_id! {
    /// Identifies a row on a board (`PVTI_...`).
    ///
    /// Assigned by GitHub when content is added to the board. Distinct from the
    /// [`ContentNodeId`] of the issue or pull request the row represents.
    ItemId
}

string_id! {
    /// Node id of the issue, pull request, or draft issue behind a board item.
    ///
    /// At most one board item exists per content node id.
    ContentNodeId
}

// ---------------------------------------------------------------------------
// Identifiers: repository names
// ---------------------------------------------------------------------------

/// Identifies a GitHub repository in `"owner/name"` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepositoryId {
    owner: String,
    name: String,
}

impl RepositoryId {
    /// Creates a repository identifier from its two parts.
    ///
    /// Returns `None` if either part is empty.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Option<Self> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() {
            None
        } else {
            Some(Self { owner, name })
        }
    }

    /// Parses `"owner/name"`. Anything with other than exactly two non-empty
    /// segments is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => Self::new(owner, name),
            _ => None,
        }
    }

    /// Returns the owning user or organisation login.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the repository name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single sync run (one CLI invocation).
///
/// Generated fresh for every run and recorded on the root span so all activity
/// from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
