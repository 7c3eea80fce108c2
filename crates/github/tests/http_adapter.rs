//! Drives the real `reqwest` transport against a local mock GitHub.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use github::{
    fetch_rate_limits, BackoffSchedule, GithubClient, GithubProjectBoard, GraphQlExecutor,
    HttpTransport, PullRequestFeed, PullRequestQuery,
};
use reconcile::{
    FieldUpdate, ItemId, ProjectBoard, RepositoryId, RequestExecutor, SyncError, ValueKind,
};

fn fast_schedule() -> BackoffSchedule {
    BackoffSchedule {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        reset_margin: Duration::ZERO,
    }
}

fn client(server: &MockServer) -> GithubClient {
    let transport = HttpTransport::new("ghp_test", server.uri()).unwrap();
    GithubClient::new(Arc::new(
        GraphQlExecutor::new(transport).with_schedule(fast_schedule()),
    ))
}

fn metadata_body() -> Value {
    json!({
        "data": { "organization": { "projectV2": {
            "id": "PVT_kwDOAAA",
            "fields": { "nodes": [
                { "id": "PVTF_pr", "name": "PR#" },
                { "id": "PVTF_user", "name": "User" },
                { "id": "PVTSSF_status", "name": "Status", "options": [
                    { "id": "opt_review", "name": "Waiting for Review" }
                ]}
            ]}
        }}}
    })
}

#[tokio::test]
async fn test_load_metadata_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer ghp_test"))
        .and(body_partial_json(json!({ "variables": { "org": "hashicorp", "number": 7 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_body()))
        .expect(1)
        .mount(&server)
        .await;

    let board = GithubProjectBoard::new(client(&server), "hashicorp", 7);
    let metadata = board.load_metadata().await.unwrap();

    assert_eq!(metadata.project_id.as_str(), "PVT_kwDOAAA");
    assert_eq!(metadata.field_id("User"), "PVTF_user");
    assert_eq!(metadata.status_option("Waiting for Review"), Some("opt_review"));
}

#[tokio::test]
async fn test_rate_limited_response_is_retried() {
    let server = MockServer::start().await;
    let reset = chrono::Utc::now().timestamp().to_string();
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-reset", reset.as_str())
                .set_body_json(json!({ "message": "API rate limit exceeded for user ID 1." })),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_body()))
        .expect(1)
        .mount(&server)
        .await;

    let board = GithubProjectBoard::new(client(&server), "hashicorp", 7);
    board.load_metadata().await.unwrap();
}

#[tokio::test]
async fn test_secondary_rate_limit_exhausts_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(403).set_body_json(
            json!({ "message": "You have exceeded a secondary rate limit. Please wait a few minutes before you try again." }),
        ))
        .expect(3)
        .mount(&server)
        .await;

    let board = GithubProjectBoard::new(client(&server), "hashicorp", 7);
    let err = board.load_metadata().await.unwrap_err();

    match err {
        SyncError::RateLimited {
            attempts,
            last_response,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert!(last_response.contains("secondary rate limit"));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .execute(&reconcile::GraphQlRequest::new("query { viewer { login } }"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Request { .. }));
}

#[tokio::test]
async fn test_update_item_sends_one_batched_mutation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": {
            "project": "PVT_kwDOAAA",
            "item": "PVTI_1",
            "f0_field": "PVTF_pr",
            "f0_value": 24512,
            "f1_field": "PVTF_user",
            "f1_value": "octocat"
        }})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {
            "set_pr_0": { "projectV2Item": { "id": "PVTI_1" } },
            "set_user_1": { "projectV2Item": { "id": "PVTI_1" } }
        }})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "org": "hashicorp" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_body()))
        .mount(&server)
        .await;

    let board = GithubProjectBoard::new(client(&server), "hashicorp", 7);
    let metadata = board.load_metadata().await.unwrap();
    let updates = vec![
        FieldUpdate::new("PR#", metadata.field_id("PR#"), ValueKind::Number, 24512_u64),
        FieldUpdate::new("User", metadata.field_id("User"), ValueKind::Text, "octocat"),
    ];

    board
        .update_item(&metadata, &ItemId::new("PVTI_1").unwrap(), &updates)
        .await
        .unwrap();
}

fn pr_node(id: &str, number: u64) -> Value {
    json!({
        "id": id, "number": number, "title": "t", "state": "OPEN",
        "reviewDecision": null, "createdAt": "2024-04-01T00:00:00Z", "closedAt": null,
        "isDraft": false, "totalCommentsCount": 0, "author": { "login": "octocat" },
        "assignees": { "nodes": [] }, "labels": { "nodes": [] }, "milestone": null,
        "reviews": { "nodes": [] }
    })
}

#[tokio::test]
async fn test_pull_request_feed_follows_cursor() {
    let server = MockServer::start().await;
    let pr = pr_node;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "variables": { "cursor": null } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "repository": {
            "pullRequests": {
                "pageInfo": { "hasNextPage": true, "endCursor": "Y3Vyc29yOjQw" },
                "nodes": [pr("PR_2", 2)]
            }
        }}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "variables": { "cursor": "Y3Vyc29yOjQw" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "repository": {
            "pullRequests": {
                "pageInfo": { "hasNextPage": false, "endCursor": null },
                "nodes": [pr("PR_1", 1)]
            }
        }}})))
        .expect(1)
        .mount(&server)
        .await;

    let feed = PullRequestFeed::new(client(&server));
    let repo = RepositoryId::parse("octo/repo").unwrap();
    let records = feed.fetch(&repo, &PullRequestQuery::default()).await.unwrap();

    let numbers: Vec<_> = records.iter().map(|r| r.number).collect();
    assert_eq!(numbers, [2, 1]);
}

#[tokio::test]
async fn test_pull_request_feed_returns_at_most_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "variables": { "cursor": null } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "repository": {
            "pullRequests": {
                "pageInfo": { "hasNextPage": true, "endCursor": "Y3Vyc29yOjQw" },
                "nodes": [pr_node("PR_9", 9), pr_node("PR_8", 8), pr_node("PR_7", 7)]
            }
        }}})))
        .expect(1)
        .mount(&server)
        .await;

    let feed = PullRequestFeed::new(client(&server));
    let repo = RepositoryId::parse("octo/repo").unwrap();
    let query = PullRequestQuery {
        limit: Some(2),
        ..PullRequestQuery::default()
    };
    let records = feed.fetch(&repo, &query).await.unwrap();

    let numbers: Vec<_> = records.iter().map(|r| r.number).collect();
    assert_eq!(numbers, [9, 8]);
}

#[tokio::test]
async fn test_rate_limits_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": {
                "core": { "limit": 5000, "used": 10, "remaining": 4990, "reset": 1700000000 },
                "graphql": { "limit": 5000, "used": 0, "remaining": 5000, "reset": 1700003600 }
            }
        })))
        .mount(&server)
        .await;

    let executor = GraphQlExecutor::new(HttpTransport::new("ghp_test", server.uri()).unwrap())
        .with_schedule(fast_schedule());
    let limits = fetch_rate_limits(&executor).await.unwrap();
    assert_eq!(limits.core().map(|b| b.remaining), Some(4990));
    assert_eq!(limits.graphql().map(|b| b.limit), Some(5000));
}

#[tokio::test]
async fn test_rate_limits_endpoint_retries_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": {
                "core": { "limit": 5000, "used": 0, "remaining": 5000, "reset": 1700000000 }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let executor = GraphQlExecutor::new(HttpTransport::new("ghp_test", server.uri()).unwrap())
        .with_schedule(fast_schedule());
    let limits = fetch_rate_limits(&executor).await.unwrap();
    assert_eq!(limits.core().map(|b| b.remaining), Some(5000));
}
