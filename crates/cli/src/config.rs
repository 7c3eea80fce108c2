//! Command-line flags and their validation.
//!
//! Every flag can also be supplied through the environment. Raw flag values
//! are parsed by `clap` into [`GlobalArgs`], then validated once into a
//! [`SyncConfig`], [`ProjectConfig`] or [`JiraConfig`] before any request is
//! made.

use std::collections::BTreeSet;

use clap::Args;
use serde::Serialize;
use thiserror::Error;

use github::DEFAULT_API_URL;
use jira::{CustomFieldIds, DEFAULT_ACV_FIELD, DEFAULT_ENGINEER_FIELD, DEFAULT_ISSUE_LINK_FIELD};
use reconcile::{FieldCatalog, FilterSet, RepositoryId};

use crate::observability::LogFormat;

/// Flags shared by every sub-command.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// GitHub token
    #[arg(short, long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Repositories to sync, as `owner/name` (comma separated)
    #[arg(short = 'r', long = "repo", global = true, env = "GITHUB_REPO", value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Organization that owns the target project
    #[arg(short = 'o', long, global = true, env = "GITHUB_PROJECT_OWNER")]
    pub project_owner: Option<String>,

    /// Number of the target project
    #[arg(short = 'p', long, global = true, env = "GITHUB_PROJECT_NUMBER")]
    pub project_number: Option<u64>,

    /// Include closed (and merged) items
    #[arg(short = 'c', long, global = true, env = "GITHUB_INCLUDE_CLOSED")]
    pub include_closed: bool,

    /// Only sync items by these authors
    #[arg(short, long, global = true, env = "GITHUB_AUTHORS", value_delimiter = ',')]
    pub authors: Vec<String>,

    /// Only sync items assigned to these users
    #[arg(long, global = true, env = "GITHUB_ASSIGNEES", value_delimiter = ',')]
    pub assignees: Vec<String>,

    /// Count reviews by these users separately
    #[arg(long, global = true, env = "GITHUB_REVIEWERS", value_delimiter = ',')]
    pub reviewers: Vec<String>,

    /// Sync items matching any of these labels (`-label` negates)
    #[arg(short = 'l', long, global = true, env = "GITHUB_LABELS_OR", value_delimiter = ',')]
    pub labels_or: Vec<String>,

    /// Sync items matching all of these labels (`-label` negates)
    #[arg(long, global = true, env = "GITHUB_LABELS_AND", value_delimiter = ',')]
    pub labels_and: Vec<String>,

    /// Only write these fields
    #[arg(long, global = true, env = "GITHUB_POPULATE_FIELDS", value_delimiter = ',')]
    pub populate_fields: Vec<String>,

    /// Write every field except these
    #[arg(long, global = true, env = "GITHUB_SKIP_FIELDS", value_delimiter = ',')]
    pub skip_fields: Vec<String>,

    /// Fetch at most this many items per repository
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    /// Classify and compute, but do not add or update anything
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// GitHub API root
    #[arg(long, global = true, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Flags of the `jira` command.
#[derive(Debug, Clone, Default, Args)]
pub struct JiraArgs {
    /// Jira instance URL
    #[arg(long, env = "JIRA_URL")]
    pub jira_url: Option<String>,

    /// Jira user
    #[arg(long, env = "JIRA_USER")]
    pub jira_user: Option<String>,

    /// Jira API token
    #[arg(long, env = "JIRA_TOKEN", hide_env_values = true)]
    pub jira_token: Option<String>,

    /// JQL query selecting the tickets to mirror
    #[arg(long, env = "JIRA_JQL")]
    pub jira_jql: Option<String>,

    /// Custom field holding the GitHub issue link
    #[arg(
        long = "jira-issue-link-custom-field-id",
        env = "JIRA_ISSUE_LINK_CUSTOM_FIELD_ID",
        default_value = DEFAULT_ISSUE_LINK_FIELD
    )]
    pub issue_link_field: String,

    /// Custom field holding the solution engineer
    #[arg(
        long = "jira-engineer-custom-field-id",
        env = "JIRA_ENGINEER_CUSTOM_FIELD_ID",
        default_value = DEFAULT_ENGINEER_FIELD
    )]
    pub engineer_field: String,

    /// Custom field holding the ACV
    #[arg(
        long = "jira-acv-custom-field-id",
        env = "JIRA_ACV_CUSTOM_FIELD_ID",
        default_value = DEFAULT_ACV_FIELD
    )]
    pub acv_field: String,
}

/// A flag combination that cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ConfigError {
    /// A required value is absent.
    #[error("{flag} parameter can't be empty")]
    Missing { flag: &'static str },

    /// A repository is not `owner/name`.
    #[error("invalid repository {value:?}: expected owner/name")]
    InvalidRepository { value: String },

    /// Both field lists were given.
    #[error("--populate-fields and --skip-fields cannot be used together")]
    ConflictingFieldSelection,

    /// A populate or skip entry names no catalog field.
    #[error("unknown field {name:?}; run `boardsync fields` for the list")]
    UnknownField { name: String },
}

/// Settings for the `prs` and `issues` commands.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub token: String,
    pub api_url: String,
    pub repos: Vec<RepositoryId>,
    pub project_owner: String,
    pub project_number: u64,
    pub include_closed: bool,
    pub limit: Option<usize>,
    pub filters: FilterSet,
    pub reviewers: BTreeSet<String>,
    pub populate_fields: Vec<String>,
    pub skip_fields: Vec<String>,
    pub dry_run: bool,
}

/// Settings for the `project` command.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub token: String,
    pub api_url: String,
    pub project_owner: String,
    pub project_number: u64,
    pub source_owner: String,
    pub source_number: u64,
    pub dry_run: bool,
}

/// Settings for the `jira` command.
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub token: String,
    pub api_url: String,
    pub project_owner: String,
    pub project_number: u64,
    pub jira_url: String,
    pub jira_user: String,
    pub jira_token: String,
    pub jql: String,
    pub custom_fields: CustomFieldIds,
    pub dry_run: bool,
}

/// Trims entries and drops empty ones, so `GITHUB_AUTHORS=""` means no filter.
fn clean(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn required(value: &Option<String>, flag: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing { flag })
}

impl GlobalArgs {
    /// The token, required by every command that talks to GitHub.
    pub fn require_token(&self) -> Result<String, ConfigError> {
        required(&self.token, "token")
    }

    fn require_project(&self) -> Result<(String, u64), ConfigError> {
        let owner = required(&self.project_owner, "project-owner")?;
        let number = self
            .project_number
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Missing {
                flag: "project-number",
            })?;
        Ok((owner, number))
    }
}

impl SyncConfig {
    /// Validates the flags for a repository sync.
    pub fn from_args(args: &GlobalArgs) -> Result<Self, ConfigError> {
        let token = args.require_token()?;

        let repos = clean(&args.repos)
            .into_iter()
            .map(|value| {
                RepositoryId::parse(&value).ok_or(ConfigError::InvalidRepository { value })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if repos.is_empty() {
            return Err(ConfigError::Missing { flag: "repo" });
        }

        let (project_owner, project_number) = args.require_project()?;

        let populate_fields = clean(&args.populate_fields);
        let skip_fields = clean(&args.skip_fields);
        if !populate_fields.is_empty() && !skip_fields.is_empty() {
            return Err(ConfigError::ConflictingFieldSelection);
        }

        Ok(Self {
            token,
            api_url: args.api_url.clone(),
            repos,
            project_owner,
            project_number,
            include_closed: args.include_closed,
            limit: args.limit,
            filters: FilterSet::from_lists(
                &clean(&args.authors),
                &clean(&args.assignees),
                &clean(&args.labels_or),
                &clean(&args.labels_and),
            ),
            reviewers: clean(&args.reviewers).into_iter().collect(),
            populate_fields,
            skip_fields,
            dry_run: args.dry_run,
        })
    }

    /// Resolves the fields to write from `catalog`, rejecting names it does
    /// not contain.
    pub fn active_fields(&self, catalog: &FieldCatalog) -> Result<Vec<String>, ConfigError> {
        if let Some(name) = self
            .populate_fields
            .iter()
            .chain(&self.skip_fields)
            .find(|name| catalog.get(name).is_none())
        {
            return Err(ConfigError::UnknownField { name: name.clone() });
        }
        Ok(catalog.resolve_active_fields(&self.populate_fields, &self.skip_fields))
    }
}

impl ProjectConfig {
    /// Validates the flags for a project-to-project copy.
    pub fn from_args(
        args: &GlobalArgs,
        source_owner: &str,
        source_number: u64,
    ) -> Result<Self, ConfigError> {
        let token = args.require_token()?;
        let (project_owner, project_number) = args.require_project()?;
        let source_owner = required(&Some(source_owner.to_string()), "source-owner")?;
        Ok(Self {
            token,
            api_url: args.api_url.clone(),
            project_owner,
            project_number,
            source_owner,
            source_number,
            dry_run: args.dry_run,
        })
    }
}

impl JiraConfig {
    /// Validates the flags for mirroring tickets onto the board.
    pub fn from_args(args: &GlobalArgs, jira: &JiraArgs) -> Result<Self, ConfigError> {
        let token = args.require_token()?;
        let (project_owner, project_number) = args.require_project()?;
        Ok(Self {
            token,
            api_url: args.api_url.clone(),
            project_owner,
            project_number,
            jira_url: required(&jira.jira_url, "jira-url")?,
            jira_user: required(&jira.jira_user, "jira-user")?,
            jira_token: required(&jira.jira_token, "jira-token")?,
            jql: required(&jira.jira_jql, "jira-jql")?,
            custom_fields: CustomFieldIds {
                issue_link: required(
                    &Some(jira.issue_link_field.clone()),
                    "jira-issue-link-custom-field-id",
                )?,
                engineer: required(
                    &Some(jira.engineer_field.clone()),
                    "jira-engineer-custom-field-id",
                )?,
                acv: required(&Some(jira.acv_field.clone()), "jira-acv-custom-field-id")?,
            },
            dry_run: args.dry_run,
        })
    }
}
