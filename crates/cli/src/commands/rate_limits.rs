//! `rate-limits`: print the REST rate-limit buckets.

use std::fmt::Write as _;

use anyhow::Context;
use chrono::{DateTime, Utc};

use github::{fetch_rate_limits, RateLimits};

use super::connect;

/// Buckets printed first, in this order. Any others follow by name.
const KNOWN_BUCKETS: [&str; 8] = [
    "core",
    "graphql",
    "search",
    "code_scanning_upload",
    "actions_runner_registration",
    "source_import",
    "integration_manifest",
    "scim",
];

/// Fetches and renders the current limits.
pub async fn run(token: &str, api_url: &str) -> anyhow::Result<String> {
    let (executor, _) = connect(token, api_url)?;
    let limits = fetch_rate_limits(&*executor)
        .await
        .context("unable to get rate limits")?;
    Ok(render(&limits, Utc::now()))
}

/// `1h2m3s` style duration, or `reset` once the window has rolled over.
pub fn human_reset(seconds: i64) -> String {
    if seconds <= 0 {
        return "reset".into();
    }
    let (h, m, s) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m{s}s"),
        _ => format!("{h}h{m}m{s}s"),
    }
}

/// Renders one line per bucket.
pub fn render(limits: &RateLimits, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "GitHub rate limits (now: {}):", now.to_rfc3339());

    let known = KNOWN_BUCKETS
        .iter()
        .filter_map(|name| limits.resources.get(*name).map(|b| (*name, b)));
    let others = limits
        .resources
        .iter()
        .filter(|(name, _)| !KNOWN_BUCKETS.contains(&name.as_str()))
        .map(|(name, b)| (name.as_str(), b));

    for (name, bucket) in known.chain(others) {
        if bucket.limit == 0 && bucket.remaining == 0 && bucket.used == 0 && bucket.reset == 0 {
            continue;
        }
        let _ = writeln!(
            out,
            "  {name:<28} limit={:>5}  remaining={:>5}  used={:>5}  resets in {}",
            bucket.limit,
            bucket.remaining,
            bucket.used,
            human_reset(bucket.seconds_until_reset(now)),
        );
    }
    out
}
