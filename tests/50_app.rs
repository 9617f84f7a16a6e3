mod common;

use anyhow::Result;
use common::{expect_error, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn setup() -> Result<(TestServer, String)> {
    let server = TestServer::spawn().await?;
    let (_, token) = server.user("foo").await?;
    assert_eq!(server.create_hub(&token, "abcd").await?.status(), StatusCode::CREATED);
    Ok((server, token))
}

#[tokio::test]
async fn register_list_and_delete_apps() -> Result<()> {
    let (server, token) = setup().await?;

    let resp = server
        .client
        .post(server.url("/api/v0/app/lights"))
        .query(&[("hub", "abcd")])
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let app: Value = resp.json().await?;
    assert_eq!(app["slug"], "lights");

    let resp = server
        .client
        .post(server.url("/api/v0/app/lights"))
        .query(&[("hub", "abcd")])
        .bearer_auth(&token)
        .send()
        .await?;
    let body = expect_error(resp, StatusCode::BAD_REQUEST, "unique_violation").await?;
    assert_eq!(body["error_description"], "app exists");

    let resp = server
        .client
        .get(server.url("/api/v0/app"))
        .query(&[("hub", "abcd")])
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.json::<Value>().await?, json!({"app": ["lights"]}));

    let resp = server
        .client
        .delete(server.url("/api/v0/app/lights"))
        .query(&[("hub", "abcd")])
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server
        .client
        .delete(server.url("/api/v0/app/lights"))
        .query(&[("hub", "abcd")])
        .bearer_auth(&token)
        .send()
        .await?;
    let body = expect_error(resp, StatusCode::NOT_FOUND, "record_not_found").await?;
    assert_eq!(body["error_description"], "app not found");
    Ok(())
}

#[tokio::test]
async fn hub_must_belong_to_caller() -> Result<()> {
    let (server, _) = setup().await?;
    let (_, bob) = server.user("bob").await?;

    let resp = server
        .client
        .post(server.url("/api/v0/app/lights"))
        .query(&[("hub", "abcd")])
        .bearer_auth(&bob)
        .send()
        .await?;
    let body = expect_error(resp, StatusCode::BAD_REQUEST, "record_not_found").await?;
    assert_eq!(body["error_description"], "hub not found");

    let resp = server
        .client
        .get(server.url("/api/v0/app"))
        .query(&[("hub", "abcd")])
        .bearer_auth(&bob)
        .send()
        .await?;
    expect_error(resp, StatusCode::BAD_REQUEST, "record_not_found").await?;
    Ok(())
}

#[tokio::test]
async fn hub_parameter_is_required() -> Result<()> {
    let (server, token) = setup().await?;

    let resp = server
        .client
        .post(server.url("/api/v0/app/lights"))
        .bearer_auth(&token)
        .send()
        .await?;
    expect_error(resp, StatusCode::BAD_REQUEST, "hub_required").await?;
    Ok(())
}

#[tokio::test]
async fn apps_go_away_with_their_hub() -> Result<()> {
    let (server, token) = setup().await?;
    server
        .client
        .post(server.url("/api/v0/app/lights"))
        .query(&[("hub", "abcd")])
        .bearer_auth(&token)
        .send()
        .await?;

    server
        .client
        .delete(server.url("/api/v0/hub"))
        .query(&[("slug", "abcd")])
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(server.create_hub(&token, "abcd").await?.status(), StatusCode::CREATED);

    let resp = server
        .client
        .get(server.url("/api/v0/app"))
        .query(&[("hub", "abcd")])
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.json::<Value>().await?, json!({"app": []}));
    Ok(())
}
