mod common;

use anyhow::Result;
use querygate::config::AuthorizationModeKind;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn post(
    server: &common::TestServer,
    token: &str,
    tenant: Option<&str>,
    body: &Value,
) -> Result<(StatusCode, Value)> {
    let mut request = reqwest::Client::new().post(server.url("orders")).bearer_auth(token).json(body);
    if let Some(tenant) = tenant {
        request = request.header("X-Client-Subdomain", tenant);
    }
    let res = request.send().await?;
    let status = res.status();
    Ok((status, res.json::<Value>().await?))
}

fn ids(payload: &Value) -> Vec<String> {
    let mut ids: Vec<String> = payload["documents"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(|d| d["id"].as_str().map(str::to_string))
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn tenant_header_scopes_results() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;
    let body = json!({"filters": [{"field": "project_id", "operator": "==", "value": "p1"}]});

    let (status, payload) = post(&server, &common::member_token(), Some("acme"), &body).await?;

    assert_eq!(status, StatusCode::OK, "payload: {}", payload);
    assert_eq!(payload["success"], true);
    assert_eq!(payload["collection"], "orders");
    assert_eq!(payload["count"], 2);
    assert_eq!(ids(&payload), vec!["o1", "o2"]);
    assert_eq!(
        payload["query"]["filters"],
        json!([
            {"field": "project_id", "operator": "==", "value": "p1"},
            {"field": "subdomain", "operator": "==", "value": "acme"}
        ])
    );
    Ok(())
}

#[tokio::test]
async fn missing_tenant_header_is_forbidden() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;
    let body = json!({"filters": [{"field": "project_id", "operator": "==", "value": "p1"}]});

    let (status, payload) = post(&server, &common::member_token(), None, &body).await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(payload["error"].as_str().unwrap_or("").contains("X-Client-Subdomain"));
    assert!(payload.get("documents").is_none());
    Ok(())
}

#[tokio::test]
async fn privileged_query_without_project_is_rejected() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;

    let (status, payload) = post(&server, &common::bypass_token(), None, &json!({"filters": []})).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload["error"].as_str().unwrap_or("").contains("project_id"));
    Ok(())
}

#[tokio::test]
async fn conflicting_client_subdomain_yields_nothing() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;
    let body = json!({"filters": [
        {"field": "project_id", "operator": "==", "value": "p1"},
        {"field": "subdomain", "operator": "==", "value": "globex"}
    ]});

    let (status, payload) = post(&server, &common::member_token(), Some("acme"), &body).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["count"], 0);
    let filters = payload["query"]["filters"].as_array().cloned().unwrap_or_default();
    assert_eq!(filters.len(), 3);
    assert_eq!(filters[1]["value"], "globex");
    assert_eq!(filters[2]["value"], "acme");
    Ok(())
}

#[tokio::test]
async fn bypass_permission_reads_across_tenants() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;
    let body = json!({"filters": [{"field": "project_id", "operator": "==", "value": "p1"}]});

    let (status, payload) = post(&server, &common::bypass_token(), Some("acme"), &body).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&payload), vec!["o1", "o2", "o3"]);
    assert_eq!(payload["query"]["filters"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn range_filters_order_and_limit() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;
    let body = json!({
        "filters": [
            {"field": "project_id", "operator": "==", "value": "p1"},
            {"field": "total", "operator": ">", "value": 30}
        ],
        "order_by": [{"field": "total", "direction": "desc"}],
        "limit": 2
    });

    let (status, payload) = post(&server, &common::bypass_token(), None, &body).await?;

    assert_eq!(status, StatusCode::OK);
    let totals: Vec<Value> = payload["documents"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|d| d["total"].clone())
        .collect();
    assert_eq!(totals, vec![json!(120), json!(75)]);
    assert_eq!(payload["query"]["limit"], 2);
    Ok(())
}

#[tokio::test]
async fn malformed_body_reports_details() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;

    let res = reqwest::Client::new()
        .post(server.url("orders"))
        .bearer_auth(common::member_token())
        .header("X-Client-Subdomain", "acme")
        .header("content-type", "application/json")
        .body(r#"{"filters":[{"field":"project_id","value":"p1"}]}"#)
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let payload = res.json::<Value>().await?;
    assert_eq!(payload["error"], "Invalid query JSON format");
    assert!(payload["details"].as_str().unwrap_or("").contains("operator"));
    Ok(())
}

#[tokio::test]
async fn non_array_membership_operand_is_bad_request() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;
    let body = json!({"filters": [
        {"field": "project_id", "operator": "==", "value": "p1"},
        {"field": "tags", "operator": "array-contains-any", "value": "priority"}
    ]});

    let (status, _) = post(&server, &common::member_token(), Some("acme"), &body).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn invalid_collection_name_is_bad_request() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;
    let body = json!({"filters": [{"field": "project_id", "operator": "==", "value": "p1"}]});

    let res = reqwest::Client::new()
        .post(format!("{}/9orders", server.base_url))
        .bearer_auth(common::member_token())
        .header("X-Client-Subdomain", "acme")
        .json(&body)
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_rejected() -> Result<()> {
    let server = common::TestServer::spawn(AuthorizationModeKind::Permissions).await?;
    let padding = "x".repeat(32 * 1024);
    let body = json!({"filters": [{"field": "project_id", "operator": "==", "value": padding}]});

    let (status, _) = post(&server, &common::member_token(), Some("acme"), &body).await?;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}
