mod common;

use anyhow::Result;
use common::{expect_error, TestServer};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn signup_creates_user() -> Result<()> {
    let server = TestServer::spawn().await?;

    let resp = server
        .client
        .post(server.url("/signup"))
        .query(&[("username", "foo"), ("email", "foo@example.com"), ("password", "password")])
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let user: Value = resp.json().await?;
    assert!(user["id"].as_i64().unwrap_or(0) > 0, "{}", user);
    assert_eq!(user["username"], "foo");
    assert_eq!(user["email"], "foo@example.com");
    assert!(user["created_at"].is_string());
    assert!(user["updated_at"].is_string());
    assert!(user.get("encrypted_password").is_none(), "hash leaked: {}", user);
    Ok(())
}

#[tokio::test]
async fn duplicate_signup_is_a_uniqueness_error() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.signup("foo").await?;

    let resp = server
        .client
        .post(server.url("/signup"))
        .form(&[("username", "foo"), ("email", "foo@example.com"), ("password", "password")])
        .send()
        .await?;

    let body = expect_error(resp, StatusCode::BAD_REQUEST, "unique_violation").await?;
    assert_eq!(body["error_description"], "user exists");
    Ok(())
}

#[tokio::test]
async fn missing_fields_are_named() -> Result<()> {
    let server = TestServer::spawn().await?;

    let resp = server
        .client
        .post(server.url("/signup"))
        .form(&[("username", "foo"), ("email", "foo@example.com")])
        .send()
        .await?;
    let body = expect_error(resp, StatusCode::BAD_REQUEST, "password_required").await?;
    assert_eq!(body["error_description"], "password required");

    let resp = server.client.post(server.url("/signup")).send().await?;
    expect_error(resp, StatusCode::BAD_REQUEST, "username_required").await?;
    Ok(())
}

#[tokio::test]
async fn malformed_email_is_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;

    let resp = server
        .client
        .post(server.url("/signup"))
        .form(&[("username", "foo"), ("email", "not-an-email"), ("password", "password")])
        .send()
        .await?;

    expect_error(resp, StatusCode::BAD_REQUEST, "invalid_email").await?;
    Ok(())
}
