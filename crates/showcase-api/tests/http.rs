//! Router-level tests: requests go through the full axum stack against an
//! in-memory database.

use std::collections::HashSet;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use showcase_api::{AppState, AppStateInner, router};
use showcase_db::Database;
use showcase_gateway::Dispatcher;
use showcase_types::events::GatewayEvent;

const SECRET: &str = "test-secret";

fn app() -> (Router, AppState) {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.to_string(),
        dispatcher: Dispatcher::new(),
        admins: HashSet::from(["admin".to_string()]),
    });
    (router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Registers a user and returns (user_id, token).
async fn register(app: &Router, username: &str) -> (Uuid, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": username, "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["user_id"].as_str().unwrap().parse().unwrap();
    (id, body["token"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn register_and_login() {
    let (app, _) = app();
    let (user_id, _) = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user_id.to_string());
    assert_eq!(body["is_admin"], false);

    let token = body["token"].as_str().unwrap();
    let (status, me) = send(&app, Method::GET, "/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
}

#[tokio::test]
async fn username_length_counts_characters() {
    let (app, _) = app();
    // 14 characters, 38 bytes.
    let (user_id, _) = register(&app, "日本語の名前です十一二三ab").await;
    assert!(!user_id.is_nil());

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "é".repeat(33), "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "éé", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn auth_failures() {
    let (app, _) = app();
    register(&app, "alice").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "password": "another password" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "bob", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn config_sections_are_admin_writable_and_published() {
    let (app, state) = app();
    let (_, admin) = register(&app, "admin").await;
    let (_, member) = register(&app, "member").await;

    let (status, _) = send(&app, Method::GET, "/config/hero", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = json!({ "value": { "title": "Launch", "particles": true } });
    let (status, _) = send(&app, Method::PUT, "/admin/config/hero", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) =
        send(&app, Method::PUT, "/admin/config/hero", Some(&member), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut feed = state.dispatcher.subscribe();

    let (status, entry) =
        send(&app, Method::PUT, "/admin/config/hero", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["revision"], 1);

    match feed.recv().await.unwrap() {
        GatewayEvent::ConfigUpdate { section, value, revision } => {
            assert_eq!(section, "hero");
            assert_eq!(value["title"], "Launch");
            assert_eq!(revision, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let (_, entry) = send(
        &app,
        Method::PUT,
        "/admin/config/hero",
        Some(&admin),
        Some(json!({ "value": { "title": "Relaunch" } })),
    )
    .await;
    assert_eq!(entry["revision"], 2);

    let (status, stored) = send(&app, Method::GET, "/config/hero", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["value"], json!({ "title": "Relaunch" }));
    assert_eq!(stored["revision"], 2);

    let (status, _) = send(&app, Method::GET, "/config/Not%20Valid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, all) = send(&app, Method::GET, "/admin/config", Some(&admin), None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn follow_edges() {
    let (app, state) = app();
    let (alice_id, alice) = register(&app, "alice").await;
    let (bob_id, bob) = register(&app, "bob").await;

    let uri = format!("/users/{}/follow", bob_id);

    let (status, _) = send(&app, Method::PUT, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/users/{}/follow", alice_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Bob is "online" and gets notified of new followers
    let (tx, mut bob_rx) = mpsc::unbounded_channel();
    state.dispatcher.register_user_channel(bob_id, tx).await;

    let (status, body) = send(&app, Method::PUT, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "following": true, "followers": 1, "following_count": 0 }));
    assert_eq!(
        bob_rx.recv().await.unwrap(),
        GatewayEvent::FollowCreate { follower_id: alice_id, followee_id: bob_id }
    );

    // Idempotent, and no second notification
    let (_, body) = send(&app, Method::PUT, &uri, Some(&alice), None).await;
    assert_eq!(body["followers"], 1);
    assert!(bob_rx.try_recv().is_err());

    let (_, body) = send(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(body["following"], false);

    let (status, body) = send(&app, Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["following"], false);
    assert_eq!(body["followers"], 0);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/users/{}/follow", Uuid::new_v4()),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn homepage_content() {
    let (app, _) = app();
    let (_, admin) = register(&app, "admin").await;

    let (status, hero) = send(
        &app,
        Method::POST,
        "/admin/heroes",
        Some(&admin),
        Some(json!({
            "title": "Genesis drop",
            "media_kind": "model",
            "effects": { "crystal": true },
            "is_active": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(hero["media_kind"], "model");
    assert_eq!(hero["effects"]["crystal"], true);

    send(
        &app,
        Method::POST,
        "/admin/heroes",
        Some(&admin),
        Some(json!({ "title": "Draft" })),
    )
    .await;

    let (_, public) = send(&app, Method::GET, "/homepage/hero", None, None).await;
    assert_eq!(public.as_array().unwrap().len(), 1);
    let (_, all) = send(&app, Method::GET, "/admin/heroes", Some(&admin), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        Method::POST,
        "/admin/heroes",
        Some(&admin),
        Some(json!({ "title": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut card_ids = Vec::new();
    for (i, title) in ["one", "two"].iter().enumerate() {
        let (_, card) = send(
            &app,
            Method::POST,
            "/admin/cards",
            Some(&admin),
            Some(json!({ "title": title, "is_published": true, "position": i })),
        )
        .await;
        card_ids.push(card["id"].as_str().unwrap().to_string());
    }

    let (status, reordered) = send(
        &app,
        Method::PUT,
        "/admin/cards/order",
        Some(&admin),
        Some(json!({ "ids": [card_ids[1], card_ids[0]] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reordered[0]["title"], "two");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/admin/cards/order",
        Some(&admin),
        Some(json!({ "ids": [card_ids[0], card_ids[0]] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, unchanged) = send(&app, Method::GET, "/admin/cards", Some(&admin), None).await;
    assert_eq!(unchanged[0]["title"], "two");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/admin/cards/{}", card_ids[0]),
        Some(&admin),
        Some(json!({ "title": "one", "is_published": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, public) = send(&app, Method::GET, "/homepage/cards", None, None).await;
    let titles: Vec<&str> = public
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["two"]);
}

#[tokio::test]
async fn store_products() {
    let (app, _) = app();
    let (_, admin) = register(&app, "admin").await;

    let (status, product) = send(
        &app,
        Method::POST,
        "/admin/products",
        Some(&admin),
        Some(json!({ "name": "Crystal Hoodie", "price_cents": 5900, "is_published": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product["slug"], "crystal-hoodie");
    assert_eq!(product["currency"], "USD");

    let (status, fetched) = send(&app, Method::GET, "/store/products/crystal-hoodie", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["price_cents"], 5900);

    let (status, _) = send(
        &app,
        Method::POST,
        "/admin/products",
        Some(&admin),
        Some(json!({ "name": "Crystal Hoodie", "price_cents": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let id = product["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/admin/products/{}", id),
        Some(&admin),
        Some(json!({ "name": "Crystal Hoodie", "price_cents": 5900, "is_published": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/store/products/crystal-hoodie", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listed) = send(&app, Method::GET, "/store/products", None, None).await;
    assert!(listed.as_array().unwrap().is_empty());
}
