mod common;

use anyhow::Result;
use common::{expect_error, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn signup_login_and_register_hub() -> Result<()> {
    let server = TestServer::spawn().await?;

    let resp = server
        .client
        .post(server.url("/signup"))
        .query(&[("username", "foo"), ("email", "foo@example.com"), ("password", "password")])
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let user: Value = resp.json().await?;

    let resp = server
        .client
        .post(server.url("/oauth/token"))
        .query(&[("grant_type", "password"), ("login", "foo"), ("password", "password")])
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    let token = body["access_token"].as_str().unwrap_or_default().to_string();
    assert_eq!(Some(server.auth.decode(&token)?.user_id), user["id"].as_i64());

    let resp = server.create_hub(&token, "abcd").await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let hub: Value = resp.json().await?;
    assert_eq!(hub["slug"], "abcd");
    assert_eq!(hub["user_id"], user["id"]);

    let resp = server.create_hub(&token, "abcd").await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body, json!({"error": "unique_violation", "error_description": "hub exists"}));
    Ok(())
}

#[tokio::test]
async fn duplicate_slug_of_another_user_leaves_hub_untouched() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, alice) = server.user("alice").await?;
    let (_, bob) = server.user("bob").await?;

    assert_eq!(server.create_hub(&alice, "abcd").await?.status(), StatusCode::CREATED);
    expect_error(server.create_hub(&bob, "abcd").await?, StatusCode::BAD_REQUEST, "unique_violation").await?;

    let resp = server.client.get(server.url("/api/v0/hub")).bearer_auth(&alice).send().await?;
    let body: Value = resp.json().await?;
    assert_eq!(body, json!({"hub": ["abcd"]}));

    let resp = server.client.get(server.url("/api/v0/hub")).bearer_auth(&bob).send().await?;
    let body: Value = resp.json().await?;
    assert_eq!(body, json!({"hub": []}));
    Ok(())
}

#[tokio::test]
async fn slug_is_required() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.user("foo").await?;

    let resp = server.client.post(server.url("/api/v0/hub")).bearer_auth(&token).send().await?;
    let body = expect_error(resp, StatusCode::BAD_REQUEST, "slug_required").await?;
    assert_eq!(body["error_description"], "slug required");

    let resp = server.client.delete(server.url("/api/v0/hub")).bearer_auth(&token).send().await?;
    expect_error(resp, StatusCode::BAD_REQUEST, "slug_required").await?;
    Ok(())
}

#[tokio::test]
async fn only_the_owner_can_delete() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, alice) = server.user("alice").await?;
    let (_, bob) = server.user("bob").await?;
    server.create_hub(&alice, "abcd").await?;

    let resp = server
        .client
        .delete(server.url("/api/v0/hub"))
        .query(&[("slug", "abcd")])
        .bearer_auth(&bob)
        .send()
        .await?;
    let body = expect_error(resp, StatusCode::BAD_REQUEST, "record_not_found").await?;
    assert_eq!(body["error_description"], "hub not found");

    let resp = server
        .client
        .delete(server.url("/api/v0/hub"))
        .query(&[("slug", "abcd")])
        .bearer_auth(&alice)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let hub: Value = resp.json().await?;
    assert_eq!(hub["slug"], "abcd");

    let resp = server.client.get(server.url("/api/v0/hub")).bearer_auth(&alice).send().await?;
    assert_eq!(resp.json::<Value>().await?, json!({"hub": []}));
    Ok(())
}
