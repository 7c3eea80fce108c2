//! boardsync GitHub infrastructure adapter.
//!
//! Implements the ports defined in the [`reconcile`] crate (`RequestExecutor`,
//! `ProjectBoard`, `EventTimeline`) over the GitHub GraphQL API, and provides
//! the issue and pull request feeds.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. All GitHub API
//! details (rate limiting, pagination, authentication, response shapes) are
//! handled here; the [`reconcile`] crate never sees them.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`executor`] | Rate-limit-aware retrying executor and the `Transport` seam |
//! | [`transport`] | `reqwest` transport |
//! | [`client`] | Shared client with typed decoding |
//! | [`project`] | Organization project board |
//! | [`pulls`] / [`issues`] | Source feeds |
//! | [`timeline`] | Label and milestone removal history |
//! | [`rate_limit`] | `GET /rate_limit` |
//! | [`url`] | Issue and pull request URL parsing |

pub mod client;
pub mod executor;
pub mod issues;
pub mod project;
pub mod pulls;
pub mod rate_limit;
pub mod timeline;
pub mod transport;
pub mod url;

pub use client::GithubClient;
pub use executor::{
    is_rate_limit_message, BackoffSchedule, GraphQlExecutor, RawResponse, Transport,
    TransportError, RATE_LIMIT_PHRASES,
};
pub use issues::IssueFeed;
pub use project::GithubProjectBoard;
pub use pulls::{PullRequestFeed, PullRequestQuery, PULLS_PAGE_SIZE};
pub use rate_limit::{fetch_rate_limits, RateBucket, RateLimits};
pub use timeline::GithubTimeline;
pub use transport::{HttpTransport, DEFAULT_API_URL};
pub use url::{parse_github_url, GithubItemUrl, UrlError};
