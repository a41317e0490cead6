//! Pet API tests.

mod common;

use axum::http::StatusCode;
use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{as_user, TestContext};
use pet_reader_backend::db::PetStore;

/// Create the pet through the API, then kill it in the store.
async fn kill_pet(ctx: &TestContext, server: &axum_test::TestServer, user_id: i64) {
    as_user(server.get("/api/pet"), user_id)
        .await
        .assert_status_ok();
    let mut pet = ctx.store.get_pet(user_id).await.unwrap().unwrap();
    pet.is_dead = true;
    pet.hunger = 3;
    ctx.store.save_pet(&pet).await.unwrap();
}

#[tokio::test]
async fn test_new_pet_is_happy() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = as_user(server.get("/api/pet"), 1).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["state"], "happy");
    assert_eq!(body["pet"]["pet_type"], "panda");
    assert_eq!(body["pet"]["is_dead"], false);
    assert_eq!(body["pet"]["sessions_today"], 0);
    assert!(body["status_text"]
        .as_str()
        .unwrap()
        .starts_with("panda is happy"));
}

#[tokio::test]
async fn test_change_pet_type() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = as_user(server.put("/api/pet"), 1)
        .json(&json!({ "pet_type": "Cat" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["pet"]["pet_type"], "cat");

    let body: Value = as_user(server.get("/api/pet"), 1).await.json();
    assert_eq!(body["pet"]["pet_type"], "cat");
}

#[tokio::test]
async fn test_unknown_pet_type_is_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = as_user(server.put("/api/pet"), 1)
        .json(&json!({ "pet_type": "dragon" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "unknown_pet_type");
}

#[tokio::test]
async fn test_two_idle_days_kill_the_pet() {
    let ctx = TestContext::new();
    let server = ctx.server();
    as_user(server.get("/api/pet"), 1).await.assert_status_ok();

    ctx.clock.advance(Duration::days(1));
    let body: Value = as_user(server.get("/api/pet"), 1).await.json();
    assert_eq!(body["pet"]["is_dead"], false);
    assert_eq!(body["pet"]["hunger"], 2);

    ctx.clock.advance(Duration::days(1));
    let body: Value = as_user(server.get("/api/pet"), 1).await.json();
    assert_eq!(body["state"], "dead");
    assert_eq!(body["pet"]["is_dead"], true);
}

#[tokio::test]
async fn test_dead_pet_starts_revival_session() {
    let ctx = TestContext::new();
    let server = ctx.server();
    kill_pet(&ctx, &server, 1).await;

    let response = as_user(server.post("/api/practice/start"), 1)
        .json(&json!({}))
        .await;
    response.assert_status_ok();
    let task: Value = response.json();
    assert_eq!(task["mode"], "revival");
    assert_eq!(task["total_items"], 20);

    let outcome: Value = as_user(server.post("/api/practice/attempt"), 1)
        .json(&common::fixtures::judged(true))
        .await
        .json();
    assert_eq!(outcome["task"]["item_index"], 1);

    let outcome: Value = as_user(server.post("/api/practice/attempt"), 1)
        .json(&common::fixtures::judged(false))
        .await
        .json();
    assert_eq!(outcome["step"], json!({ "kind": "streak_reset" }));
    assert_eq!(outcome["task"]["item_index"], 0);
}

#[tokio::test]
async fn test_dead_pet_cannot_do_freecare() {
    let ctx = TestContext::new();
    let server = ctx.server();
    kill_pet(&ctx, &server, 1).await;

    let response = as_user(server.post("/api/practice/freecare"), 1).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"], "pet_dead");
}

#[tokio::test]
async fn test_pet_dying_mid_session_blocks_answers() {
    let ctx = TestContext::new();
    let server = ctx.server();
    as_user(server.post("/api/practice/start"), 1)
        .json(&json!({}))
        .await
        .assert_status_ok();
    as_user(server.post("/api/practice/attempt"), 1)
        .json(&common::fixtures::judged(true))
        .await
        .assert_status_ok();

    ctx.clock.advance(Duration::days(2));
    let response = as_user(server.post("/api/practice/attempt"), 1)
        .json(&common::fixtures::judged(true))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"], "pet_dead");

    let task: Value = as_user(server.post("/api/practice/start"), 1)
        .json(&json!({}))
        .await
        .json();
    assert_eq!(task["mode"], "revival");
}
