//! boardsync Jira adapter.
//!
//! Searches a Jira Cloud instance with JQL and flattens each result into a
//! [`reconcile::TicketRecord`]. The board write itself lives in the CLI; this
//! crate only reads.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`client`] | Basic-auth REST client and paged search |
//! | [`issue`] | Search response shapes and custom-field extraction |

pub mod client;
pub mod issue;

pub use client::{JiraClient, JiraError, SEARCH_PAGE_SIZE};
pub use issue::{
    parse_jira_time, CustomFieldIds, DEFAULT_ACV_FIELD, DEFAULT_ENGINEER_FIELD,
    DEFAULT_ISSUE_LINK_FIELD,
};
