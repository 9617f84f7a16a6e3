mod common;

use anyhow::Result;
use common::{expect_error, TestServer};
use reqwest::StatusCode;
use ripple_cloud::database::Store;

#[tokio::test]
async fn no_token_is_unauthorized() -> Result<()> {
    let server = TestServer::spawn().await?;

    let resp = server.client.get(server.url("/api/v0/hub")).send().await?;

    let body = expect_error(resp, StatusCode::UNAUTHORIZED, "invalid_token").await?;
    assert_eq!(body["error_description"], "no token present in request");
    Ok(())
}

#[tokio::test]
async fn malformed_token_reports_decode_error() -> Result<()> {
    let server = TestServer::spawn().await?;

    let resp = server
        .client
        .get(server.url("/api/v0/hub"))
        .bearer_auth("not-a-token")
        .send()
        .await?;

    let body = expect_error(resp, StatusCode::UNAUTHORIZED, "invalid_token").await?;
    assert_ne!(body["error_description"], "token is not valid");
    Ok(())
}

#[tokio::test]
async fn access_token_query_parameter() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.user("foo").await?;

    let resp = server
        .client
        .get(server.url("/api/v0/hub"))
        .query(&[("access_token", token.as_str())])
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn token_without_scope_is_forbidden() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (user_id, _) = server.user("foo").await?;
    let app_only = server.token_with_scopes(user_id, &["app"]).await?;

    let resp = server.create_hub(&app_only, "abcd").await?;

    let body = expect_error(resp, StatusCode::FORBIDDEN, "invalid_scope").await?;
    assert_eq!(body["error_description"], "token is not valid for this scope");
    assert!(server.store.hub_by_slug("abcd").await.is_err());
    Ok(())
}

#[tokio::test]
async fn messaging_routes_need_hub_scope() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (user_id, _) = server.user("foo").await?;
    let user_only = server.token_with_scopes(user_id, &["user"]).await?;

    let resp = server
        .client
        .get(server.url("/api/v0/received/temp/last"))
        .bearer_auth(&user_only)
        .send()
        .await?;

    expect_error(resp, StatusCode::FORBIDDEN, "invalid_scope").await?;
    Ok(())
}
