//! Integration tests for the session middleware and demo routes.
//!
//! Uses Tower's `oneshot()` to test the full Axum app including middleware.

mod common;

use aws_sdk_dynamodb::types::AttributeValue;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{
    TestStore, body_json, build_flaky_test_app, build_test_app, build_test_app_with_config,
    request, session_cookie,
};
use dynamo_sessions::config::Config;
use dynamo_sessions::repository::SessionRepository;
use serde_json::json;
use tower::ServiceExt;

/// Store two pairs through the router; returns the session cookie.
async fn seed_two_pairs(app: &axum::Router) -> String {
    let resp = app
        .clone()
        .oneshot(request("PUT", "/session/key_one", None, Some(json!("value_one"))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp, "__sid__").expect("new session sets a cookie");

    let resp = app
        .clone()
        .oneshot(request(
            "PUT",
            "/session/key_two",
            Some(&cookie),
            Some(json!("value_two")),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    cookie
}

fn stored_key(store: &TestStore, session_id: &str) -> String {
    store.repository().get_hash_key(session_id, "app")
}

// ───── GET /health ─────

#[tokio::test]
async fn test_health() {
    let (app, _store) = build_test_app();
    let resp = app.oneshot(request("GET", "/health", None, None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("set-cookie").is_none());
    let body = body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["application"], "app");
    assert_eq!(body["table"], "NancySessions");
}

// ───── GET /session ─────

#[tokio::test]
async fn test_anonymous_read_sets_no_cookie() {
    let (app, store) = build_test_app();
    let resp = app.oneshot(request("GET", "/session", None, None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("set-cookie").is_none());
    assert!(store.repository().table().is_empty());
    let body = body_json(resp).await;
    assert!(body["session_id"].is_null());
    assert_eq!(body["data"], json!({}));
}

#[tokio::test]
async fn test_round_trip_through_router() {
    let (app, store) = build_test_app();
    let cookie = seed_two_pairs(&app).await;

    let resp = app
        .oneshot(request("GET", "/session", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // read-only request: nothing rewritten
    assert!(resp.headers().get("set-cookie").is_none());

    let body = body_json(resp).await;
    assert_eq!(body["session_id"], cookie.as_str());
    assert_eq!(
        body["data"],
        json!({"key_one": "value_one", "key_two": "value_two"})
    );
    assert_eq!(store.repository().table().len(), 1);
}

#[tokio::test]
async fn test_update_keeps_session_id_and_refreshes_cookie() {
    let (app, _store) = build_test_app();
    let cookie = seed_two_pairs(&app).await;

    let resp = app
        .oneshot(request("PUT", "/session/key_one", Some(&cookie), Some(json!(42))))
        .await
        .unwrap();
    let set_cookie = resp
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with(&format!("__sid__={cookie};")));
    assert!(set_cookie.contains("Expires="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_stored_data_is_encrypted() {
    let (app, store) = build_test_app();
    let cookie = seed_two_pairs(&app).await;

    let item = store
        .repository()
        .table()
        .get_raw(&stored_key(&store, &cookie))
        .unwrap();
    let data = item.get("Data").unwrap().as_s().unwrap();
    assert!(!data.contains("value_one"));
    assert_eq!(item.get("Ver").unwrap().as_s().unwrap(), "1.0");
}

#[tokio::test]
async fn test_plain_serializer_when_encryption_disabled() {
    let mut config = Config::test_default();
    config.encrypt_sessions = false;
    let (app, store) = build_test_app_with_config(config);
    let cookie = seed_two_pairs(&app).await;

    let item = store
        .repository()
        .table()
        .get_raw(&stored_key(&store, &cookie))
        .unwrap();
    let data = item.get("Data").unwrap().as_s().unwrap();
    assert!(data.contains("key_one="));

    let resp = app
        .oneshot(request("GET", "/session", Some(&cookie), None))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"]["key_two"], "value_two");
}

#[tokio::test]
async fn test_https_only_marks_cookie_secure() {
    let mut config = Config::test_default();
    config.https_only = true;
    let (app, _store) = build_test_app_with_config(config);

    let resp = app
        .oneshot(request("PUT", "/session/k", None, Some(json!("v"))))
        .await
        .unwrap();
    let set_cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap();
    assert!(set_cookie.contains("Secure"));
}

// ───── expiry / tamper / bad cookies ─────

#[tokio::test]
async fn test_expired_session_is_empty_and_removed() {
    let (app, store) = build_test_app();
    let cookie = seed_two_pairs(&app).await;

    // rewrite the record as if it expired ten minutes ago
    let key = stored_key(&store, &cookie);
    let mut item = store.repository().table().get_raw(&key).unwrap();
    let past = (Utc::now() - Duration::minutes(10)).to_rfc3339();
    item.insert("Expires".into(), AttributeValue::S(past));
    store.repository().table().insert_raw(&key, item);

    let resp = app
        .oneshot(request("GET", "/session", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["session_id"].is_null());
    assert_eq!(body["data"], json!({}));
    assert!(store.repository().table().is_empty());
}

#[tokio::test]
async fn test_tampered_session_is_empty() {
    let (app, store) = build_test_app();
    let cookie = seed_two_pairs(&app).await;

    let key = stored_key(&store, &cookie);
    let mut item = store.repository().table().get_raw(&key).unwrap();
    let data = item.get("Data").unwrap().as_s().unwrap().clone();
    let tampered = format!("{}x", data);
    item.insert("Data".into(), AttributeValue::S(tampered));
    store.repository().table().insert_raw(&key, item);

    let resp = app
        .oneshot(request("GET", "/session", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["session_id"], cookie.as_str());
    assert_eq!(body["data"], json!({}));
}

#[tokio::test]
async fn test_garbage_cookie_is_ignored() {
    let (app, _store) = build_test_app();
    let resp = app
        .oneshot(request("GET", "/session", Some("../../etc"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["session_id"].is_null());
}

#[tokio::test]
async fn test_unknown_session_id_is_not_adopted() {
    let (app, _store) = build_test_app();
    let chosen = uuid::Uuid::new_v4().to_string();

    let resp = app
        .oneshot(request("PUT", "/session/k", Some(&chosen), Some(json!("v"))))
        .await
        .unwrap();
    let issued = session_cookie(&resp, "__sid__").unwrap();
    assert_ne!(issued, chosen);
}

#[tokio::test]
async fn test_seeded_record_is_readable() {
    let (app, store) = build_test_app();
    let id = uuid::Uuid::new_v4().to_string();
    let expires = Utc::now() + Duration::minutes(5);
    let data = "key_one=%22value_one%22;";

    let mut config = Config::test_default();
    config.encrypt_sessions = false;
    let (plain_app, plain_store) = build_test_app_with_config(config);
    plain_store
        .repository()
        .save_session(&id, "app", data, expires, true)
        .await
        .unwrap();

    let resp = plain_app
        .oneshot(request("GET", "/session", Some(&id), None))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"]["key_one"], "value_one");

    // the encrypted app can't read a plain record and degrades to empty
    store
        .repository()
        .save_session(&id, "app", data, expires, true)
        .await
        .unwrap();
    let resp = app
        .oneshot(request("GET", "/session", Some(&id), None))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"], json!({}));
}

// ───── DELETE /session/{key} ─────

#[tokio::test]
async fn test_delete_value() {
    let (app, _store) = build_test_app();
    let cookie = seed_two_pairs(&app).await;

    let resp = app
        .clone()
        .oneshot(request("DELETE", "/session/key_one", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(request("DELETE", "/session/missing", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(request("GET", "/session", Some(&cookie), None))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"], json!({"key_two": "value_two"}));
}

// ───── POST /abandon ─────

#[tokio::test]
async fn test_abandon_clears_cookie_and_record() {
    let (app, store) = build_test_app();
    let cookie = seed_two_pairs(&app).await;

    let resp = app
        .clone()
        .oneshot(request("POST", "/abandon", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));
    assert!(store.repository().table().is_empty());

    let resp = app
        .oneshot(request("GET", "/session", Some(&cookie), None))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert!(body["session_id"].is_null());
}

#[tokio::test]
async fn test_abandon_without_session() {
    let (app, _store) = build_test_app();
    let resp = app
        .oneshot(request("POST", "/abandon", None, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("__sid__=;"));
}

#[tokio::test]
async fn test_key_named_abandon_is_an_ordinary_key() {
    let (app, _store) = build_test_app();
    let resp = app
        .clone()
        .oneshot(request("PUT", "/session/abandon", None, Some(json!("still here"))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp, "__sid__").unwrap();

    let resp = app
        .oneshot(request("GET", "/session", Some(&cookie), None))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"]["abandon"], "still here");
}

// ───── storage failures ─────

#[tokio::test]
async fn test_load_failure_is_503() {
    let (app, table) = build_flaky_test_app();
    table.fail_reads(true);
    let id = uuid::Uuid::new_v4().to_string();

    let resp = app
        .oneshot(request("GET", "/session", Some(&id), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(resp.headers().get("set-cookie").is_none());
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Session storage unavailable");
}

#[tokio::test]
async fn test_save_failure_is_503() {
    let (app, table) = build_flaky_test_app();
    table.fail_writes(true);

    let resp = app
        .oneshot(request("PUT", "/session/k", None, Some(json!("v"))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(resp.headers().get("set-cookie").is_none());
    assert_eq!(table.len(), 0);
}

#[tokio::test]
async fn test_abandon_failure_is_503() {
    let (app, table) = build_flaky_test_app();
    let resp = app
        .clone()
        .oneshot(request("PUT", "/session/k", None, Some(json!("v"))))
        .await
        .unwrap();
    let cookie = session_cookie(&resp, "__sid__").unwrap();

    table.fail_writes(true);
    let resp = app
        .oneshot(request("POST", "/abandon", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(resp.headers().get("set-cookie").is_none());
    assert_eq!(table.len(), 1);
}
