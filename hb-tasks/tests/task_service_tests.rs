use std::sync::Arc;

use chrono::{Duration, Utc};
use hb_tasks::{
    Credential, CredentialState, CredentialStore, InMemoryCredentialStore, NewTask, OAuthClient,
    OAuthConfig, TaskError, TaskService, TasksClient,
};
use wiremock::matchers::{any, body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oauth_for(server: &MockServer) -> OAuthClient {
    let mut config = OAuthConfig::google(
        "client-123",
        "secret-456",
        "http://localhost:3002/oauth2callback",
    );
    config.token_url = format!("{}/token", server.uri());
    OAuthClient::new(config).expect("oauth client")
}

fn credential(access: &str, refresh: Option<&str>, expires_in_secs: i64) -> Credential {
    let now = Utc::now();
    Credential {
        access_token: Some(access.to_string()),
        refresh_token: refresh.map(str::to_string),
        expires_at: Some(now + Duration::seconds(expires_in_secs)),
        scope: None,
        obtained_at: now,
    }
}

fn service(server: &MockServer, held: Option<Credential>) -> (TaskService, Arc<InMemoryCredentialStore>) {
    let mut store = InMemoryCredentialStore::new(Arc::new(oauth_for(server)));
    if let Some(c) = held {
        store = store.with_credential(c);
    }
    let store = Arc::new(store);
    let client = TasksClient::new(&server.uri()).expect("tasks client");
    (TaskService::new(client, store.clone()), store)
}

#[tokio::test]
async fn every_operation_requires_auth_without_credential() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let (svc, _store) = service(&server, None);

    assert!(matches!(svc.list_task_lists().await, Err(TaskError::AuthRequired(_))));
    assert!(matches!(svc.list_tasks("l1").await, Err(TaskError::AuthRequired(_))));
    assert!(matches!(
        svc.find_or_create_list("Garden").await,
        Err(TaskError::AuthRequired(_))
    ));
    assert!(matches!(
        svc.insert_task("l1", &NewTask::titled("Water")).await,
        Err(TaskError::AuthRequired(_))
    ));
}

#[tokio::test]
async fn empty_title_is_rejected_before_any_network_call() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    // Expired token: a refresh would hit the token endpoint if validation ran late.
    let (svc, _store) = service(&server, Some(credential("stale", Some("r"), -60)));

    assert!(matches!(
        svc.insert_task("l1", &NewTask::titled("   ")).await,
        Err(TaskError::InvalidArgument(_))
    ));
    assert!(matches!(
        svc.insert_task("", &NewTask::titled("Water")).await,
        Err(TaskError::InvalidArgument(_))
    ));
    assert!(matches!(
        svc.find_or_create_list("").await,
        Err(TaskError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn find_or_create_reuses_list_on_second_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "id": "other", "title": "Groceries" }]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/@me/lists"))
        .and(body_json(serde_json::json!({ "title": "Routine" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "L1", "title": "Routine" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": "other", "title": "Groceries" },
                { "id": "L1", "title": "Routine" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (svc, _store) = service(&server, Some(credential("valid", Some("r"), 3600)));

    let first = svc.find_or_create_list("Routine").await.expect("first");
    assert_eq!(first.id, "L1");
    assert!(first.created);

    let second = svc.find_or_create_list("Routine").await.expect("second");
    assert_eq!(second.id, "L1");
    assert!(!second.created);
}

#[tokio::test]
async fn find_or_create_is_case_sensitive_and_first_match_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": "lower", "title": "routine" },
                { "id": "first", "title": "Routine" },
                { "id": "second", "title": "Routine" }
            ]
        })))
        .mount(&server)
        .await;

    let (svc, _store) = service(&server, Some(credential("valid", None, 3600)));
    let resolved = svc.find_or_create_list("Routine").await.expect("resolve");
    assert_eq!(resolved.id, "first");
    assert!(!resolved.created);
}

#[tokio::test]
async fn list_lookup_follows_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "id": "L9", "title": "Routine" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "id": "L1", "title": "Groceries" }],
            "nextPageToken": "p2"
        })))
        .mount(&server)
        .await;

    let (svc, _store) = service(&server, Some(credential("valid", None, 3600)));
    let lists = svc.list_task_lists().await.expect("lists");
    assert_eq!(
        lists.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(),
        vec!["L1", "L9"]
    );
}

#[tokio::test]
async fn find_or_create_propagates_provider_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend down"))
        .mount(&server)
        .await;

    let (svc, _store) = service(&server, Some(credential("valid", None, 3600)));
    let err = svc.find_or_create_list("Routine").await.expect_err("should fail");
    assert_eq!(err.provider_status(), Some(503));
}

#[tokio::test]
async fn empty_list_is_distinct_from_missing_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lists/empty/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "tasks#tasks"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lists/missing/tasks"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "code": 404, "message": "Task list not found." }
        })))
        .mount(&server)
        .await;

    let (svc, _store) = service(&server, Some(credential("valid", None, 3600)));
    assert!(svc.list_tasks("empty").await.expect("empty list").is_empty());
    assert!(matches!(
        svc.list_tasks("missing").await,
        Err(TaskError::ListNotFound(ref id)) if id == "missing"
    ));
}

#[tokio::test]
async fn list_tasks_keeps_provider_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lists/L1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": "b", "title": "Prune", "status": "completed" },
                { "id": "a", "title": "Water", "status": "needsAction", "due": "2026-10-20T00:00:00.000Z" }
            ]
        })))
        .mount(&server)
        .await;

    let (svc, _store) = service(&server, Some(credential("valid", None, 3600)));
    let tasks = svc.list_tasks("L1").await.expect("tasks");
    assert_eq!(tasks[0].title, "Prune");
    assert!(tasks[0].is_completed());
    assert_eq!(tasks[1].title, "Water");
    assert!(tasks[1].due.is_some());
}

#[tokio::test]
async fn insert_maps_provider_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lists/gone/tasks"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lists/locked/tasks"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lists/broken/tasks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let (svc, _store) = service(&server, Some(credential("valid", None, 3600)));
    let task = NewTask::titled("Water");
    assert!(matches!(
        svc.insert_task("gone", &task).await,
        Err(TaskError::ListNotFound(_))
    ));
    assert!(matches!(
        svc.insert_task("locked", &task).await,
        Err(TaskError::AuthRequired(_))
    ));
    assert!(matches!(
        svc.insert_task("broken", &task).await,
        Err(TaskError::Provider { status: 500, .. })
    ));
}

#[tokio::test]
async fn expired_token_is_refreshed_before_insert() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .and(body_string_contains("client_secret=secret-456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-access",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lists/L1/tasks"))
        .and(header("authorization", "Bearer fresh-access"))
        .and(body_json(serde_json::json!({ "title": "Water plants" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "t1",
            "title": "Water plants",
            "status": "needsAction"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (svc, store) = service(&server, Some(credential("stale", Some("refresh-1"), -60)));
    let inserted = svc
        .insert_task("L1", &NewTask::titled("  Water plants "))
        .await
        .expect("insert after refresh");
    assert_eq!(inserted.id, "t1");

    let held = store.get().await.expect("credential");
    assert_eq!(held.access_token.as_deref(), Some("fresh-access"));
    assert_eq!(held.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(store.state().await, CredentialState::Authenticated);
}

#[tokio::test]
async fn rejected_refresh_surfaces_auth_required() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (svc, store) = service(&server, Some(credential("stale", Some("revoked"), -60)));
    assert!(matches!(
        svc.list_task_lists().await,
        Err(TaskError::AuthRequired(_))
    ));
    assert_eq!(store.state().await, CredentialState::Unauthenticated);
}

#[tokio::test]
async fn token_endpoint_outage_keeps_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (svc, store) = service(&server, Some(credential("stale", Some("rt-valid"), -60)));
    assert!(matches!(
        svc.list_task_lists().await,
        Err(TaskError::AuthRequired(_))
    ));
    assert_eq!(store.state().await, CredentialState::Expired);
    let held = store.get().await.expect("credential kept");
    assert_eq!(held.refresh_token.as_deref(), Some("rt-valid"));
}

#[tokio::test]
async fn concurrent_requests_share_a_single_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "access_token": "fresh-access",
                    "expires_in": 3599
                }))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
        .expect(5)
        .mount(&server)
        .await;

    let (svc, _store) = service(&server, Some(credential("stale", Some("r"), -60)));
    let results =
        futures_util::future::join_all((0..5).map(|_| svc.list_task_lists())).await;
    for result in results {
        assert!(result.expect("lists").is_empty());
    }
}

#[tokio::test]
async fn exchange_code_posts_authorization_code_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .and(body_string_contains("client_id=client-123"))
        .and(body_string_contains("redirect_uri="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "a1",
            "refresh_token": "r1",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/tasks"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let grant = oauth_for(&server)
        .exchange_code("auth-code-1")
        .await
        .expect("exchange");
    let held = Credential::from_grant(grant, Utc::now());
    assert_eq!(held.state_at(Utc::now()), CredentialState::Authenticated);
    assert_eq!(held.refresh_token.as_deref(), Some("r1"));
}
