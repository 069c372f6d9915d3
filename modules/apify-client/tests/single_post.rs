use apify_client::{ApifyClient, ApifyError};
use httpmock::prelude::*;
use serde_json::json;

fn client(server: &MockServer) -> ApifyClient {
    ApifyClient::new("test-token".into()).with_base_url(server.base_url())
}

#[tokio::test]
async fn scrape_tweet_runs_actor_and_returns_first_item() {
    let server = MockServer::start_async().await;

    let start = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/acts/61RPP7dywgiy0JPD0/runs")
                .header("authorization", "Bearer test-token");
            then.status(201).json_body(json!({
                "data": { "id": "run-1", "status": "RUNNING", "defaultDatasetId": "ds-1" }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/actor-runs/run-1");
            then.status(200).json_body(json!({
                "data": { "id": "run-1", "status": "SUCCEEDED", "defaultDatasetId": "ds-1" }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/datasets/ds-1/items");
            then.status(200).json_body(json!([
                { "id": "42", "fullText": "hello", "author": { "userName": "jack" } }
            ]));
        })
        .await;

    let tweet = client(&server)
        .scrape_tweet("https://x.com/jack/status/42")
        .await
        .unwrap()
        .unwrap();

    start.assert_async().await;
    assert_eq!(tweet.content(), Some("hello"));
    assert_eq!(
        tweet.author.and_then(|a| a.user_name).as_deref(),
        Some("jack")
    );
}

#[tokio::test]
async fn failed_run_surfaces_status() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/acts/curious_coder~threads-scraper/runs");
            then.status(201).json_body(json!({
                "data": { "id": "run-2", "status": "READY", "defaultDatasetId": "ds-2" }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/actor-runs/run-2");
            then.status(200).json_body(json!({
                "data": { "id": "run-2", "status": "FAILED", "defaultDatasetId": "ds-2" }
            }));
        })
        .await;

    let err = client(&server)
        .scrape_thread("https://www.threads.net/@zuck/post/abc")
        .await
        .unwrap_err();

    assert!(matches!(err, ApifyError::RunFailed(ref s) if s == "FAILED"));
}

#[tokio::test]
async fn non_success_start_is_api_error() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/acts/61RPP7dywgiy0JPD0/runs");
            then.status(402).body("payment required");
        })
        .await;

    let err = client(&server)
        .scrape_tweet("https://x.com/jack/status/42")
        .await
        .unwrap_err();

    match err {
        ApifyError::Api { status, message } => {
            assert_eq!(status, 402);
            assert_eq!(message, "payment required");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn run_that_never_finishes_stops_after_max_polls() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/acts/61RPP7dywgiy0JPD0/runs");
            then.status(201).json_body(json!({
                "data": { "id": "run-3", "status": "READY", "defaultDatasetId": "ds-3" }
            }));
        })
        .await;
    let poll = server
        .mock_async(|when, then| {
            when.method(GET).path("/actor-runs/run-3");
            then.status(200).json_body(json!({
                "data": { "id": "run-3", "status": "RUNNING", "defaultDatasetId": "ds-3" }
            }));
        })
        .await;

    let err = client(&server)
        .with_max_polls(2)
        .scrape_tweet("https://x.com/jack/status/42")
        .await
        .unwrap_err();

    assert_eq!(poll.hits_async().await, 2);
    match err {
        ApifyError::PollLimit { run_id, status, polls } => {
            assert_eq!(run_id, "run-3");
            assert_eq!(status, "RUNNING");
            assert_eq!(polls, 2);
        }
        other => panic!("expected PollLimit, got {other:?}"),
    }
}
