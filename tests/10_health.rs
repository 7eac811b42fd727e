mod common;

use anyhow::Result;
use querygate::config::AuthorizationModeKind;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_reports_store() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;

    let res = reqwest::get(format!("{}/health", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["store"], "memory");
    Ok(())
}

#[tokio::test]
async fn root_is_public() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;

    let res = reqwest::get(format!("{}/", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["name"], "querygate");
    Ok(())
}
