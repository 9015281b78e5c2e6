//! Operator reconciliation endpoints and the outbound gateway client.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bigdecimal::BigDecimal;
use num_traits::Zero;
use serde_json::{json, Value};
use uuid::Uuid;

use ledgerhook::service::gateway::GatewayClient;

mod common;
use common::*;

fn field(body: &Value, pointer: &str) -> BigDecimal {
    let value = body.pointer(pointer).unwrap_or_else(|| panic!("missing {}", pointer));
    match value {
        Value::String(text) => dec(text),
        other => dec(&other.to_string()),
    }
}

async fn seeded_app(gateway_balance: &str) -> (TestApp, Uuid, Uuid) {
    let app = TestApp::with(
        test_config(),
        Arc::new(StaticGateway { balance: dec(gateway_balance) }),
    );

    let balanced = app.user("100.00").await;
    app.ledger
        .record_transaction(balanced, dec("120.00"), TransactionType::BankDeposit, TransactionStatus::Success)
        .await;
    app.ledger
        .record_transaction(balanced, dec("20.00"), TransactionType::Withdrawal, TransactionStatus::Success)
        .await;

    let drifted = app.user("50.02").await;
    app.ledger
        .record_transaction(drifted, dec("50.00"), TransactionType::CardDeposit, TransactionStatus::Success)
        .await;

    (app, balanced, drifted)
}

#[tokio::test]
async fn test_reconciliation_requires_an_operator() {
    let (app, _, _) = seeded_app("150.02").await;

    let (status, _) = app.send(operator_request("POST", RECONCILIATION_PATH, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(operator_request("POST", RECONCILIATION_PATH, Some("not-a-jwt")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(operator_request("POST", RECONCILIATION_PATH, Some(&operator_token("user"))))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, _) = app
        .send(operator_request("DELETE", RECONCILIATION_PATH, Some(&operator_token("user"))))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_report_flags_discrepancies_within_tolerance() {
    let (app, balanced, drifted) = seeded_app("150.02").await;

    let (status, body) = app
        .send(operator_request("POST", RECONCILIATION_PATH, Some(&operator_token("admin"))))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["users_checked"], 2);
    assert_eq!(body["summary"]["discrepancy_count"], 1);
    assert_eq!(body["summary"]["error_count"], 0);
    assert_eq!(body["summary"]["matched"], true);
    assert_eq!(body["summary"]["run_by"], "admin-operator");
    assert_eq!(field(&body, "/summary/total_system_balance"), dec("150.02"));
    assert_eq!(body["cached"], false);

    let rows = body["users"].as_array().unwrap();
    let row = |id: Uuid| {
        rows.iter()
            .find(|row| row["user_id"] == id.to_string())
            .unwrap()
            .clone()
    };
    assert_eq!(row(balanced)["status"], "OK");
    assert_eq!(row(drifted)["status"], "DISCREPANCY");
    assert_eq!(field(&row(drifted), "/difference"), dec("0.02"));
}

#[tokio::test]
async fn test_aggregate_mismatch_is_reported() {
    let (app, _, _) = seeded_app("100.00").await;

    let (_, body) = app
        .send(operator_request("POST", RECONCILIATION_PATH, Some(&operator_token("super_admin"))))
        .await;

    assert_eq!(body["summary"]["matched"], false);
    assert_eq!(field(&body, "/summary/difference"), dec("50.02"));
}

#[tokio::test]
async fn test_per_user_errors_produce_error_rows() {
    let (app, balanced, drifted) = seeded_app("150.02").await;
    app.ledger.fail_lookups_for(drifted).await;

    let (status, body) = app
        .send(operator_request("POST", RECONCILIATION_PATH, Some(&operator_token("admin"))))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["error_count"], 1);
    let rows = body["users"].as_array().unwrap();
    let error_row = rows.iter().find(|row| row["user_id"] == drifted.to_string()).unwrap();
    assert_eq!(error_row["status"], "ERROR");
    assert!(error_row["error"].is_string());
    assert!(rows.iter().any(|row| row["user_id"] == balanced.to_string() && row["status"] == "OK"));
}

#[tokio::test]
async fn test_reports_are_cached_until_refresh_or_clear() {
    let (app, _, _) = seeded_app("150.02").await;
    let token = operator_token("admin");

    let (_, first) = app.send(operator_request("POST", RECONCILIATION_PATH, Some(&token))).await;
    assert_eq!(first["cached"], false);

    app.user("1.00").await;

    let (_, cached) = app.send(operator_request("POST", RECONCILIATION_PATH, Some(&token))).await;
    assert_eq!(cached["cached"], true);
    assert_eq!(cached["summary"]["users_checked"], 2);

    let refresh_uri = format!("{}?refresh=true", RECONCILIATION_PATH);
    let (_, refreshed) = app.send(operator_request("POST", &refresh_uri, Some(&token))).await;
    assert_eq!(refreshed["cached"], false);
    assert_eq!(refreshed["summary"]["users_checked"], 3);

    let (status, cleared) = app.send(operator_request("DELETE", RECONCILIATION_PATH, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        cleared,
        json!({ "ok": true, "cleared": ["reconciliation:report", "reconciliation:gateway_balance"] })
    );

    let (_, after_clear) = app.send(operator_request("POST", RECONCILIATION_PATH, Some(&token))).await;
    assert_eq!(after_clear["cached"], false);
}

#[tokio::test]
async fn test_token_cookie_is_accepted() {
    let (app, _, _) = seeded_app("0").await;
    let request = Request::builder()
        .method("GET")
        .uri(format!("{}/gateway-status", RECONCILIATION_PATH))
        .header("cookie", format!("token={}", operator_token("admin")))
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configured"], true);
    assert_eq!(body["token_acquired"], true);
}

#[tokio::test]
async fn test_webhook_credits_reconcile_cleanly() {
    let app = TestApp::with(test_config(), Arc::new(StaticGateway { balance: dec("99.50") }));
    let user_id = app.user("0.00").await;

    let payload = deposit_payload(user_id, "tx-rec", json!("100.00"), json!("0.50"));
    let (status, _) = app.send(webhook_request(&payload)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .send(operator_request("POST", RECONCILIATION_PATH, Some(&operator_token("admin"))))
        .await;

    assert_eq!(body["users"][0]["status"], "OK");
    assert_eq!(body["summary"]["matched"], true);
}

#[tokio::test]
async fn test_health_reports_cache_backend() {
    let app = TestApp::new();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "cache": "memory" }));
}

/// Serves the two gateway endpoints on an ephemeral port.
async fn spawn_gateway(balance_status: StatusCode, balance_body: Value) -> String {
    let app = Router::new()
        .route(
            "/v1/auth/token/issue",
            post(|Json(body): Json<Value>| async move {
                if body["grant_type"] == "client_credentials" && body["client_id"] == "client" {
                    (StatusCode::OK, Json(json!({ "data": { "access_token": "tok-1" } })))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad credentials" })))
                }
            }),
        )
        .route(
            "/v1/accounts/balance",
            get(move |headers: HeaderMap| {
                let balance_body = balance_body.clone();
                async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        == Some("Bearer tok-1");
                    let account = headers.get("accountid").and_then(|value| value.to_str().ok());
                    if !authorized || account != Some("acct-1") {
                        return (StatusCode::UNAUTHORIZED, Json(json!({})));
                    }
                    (balance_status, Json(balance_body))
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", address)
}

fn client_for(base_url: String) -> GatewayClient {
    let mut config = test_config();
    config.gateway_base_url = base_url;
    GatewayClient::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_gateway_client_reads_balance() {
    let base_url = spawn_gateway(StatusCode::OK, json!({ "data": { "amount": "1234.50" } })).await;
    let client = client_for(base_url);

    assert!(client.is_configured());
    assert_eq!(client.access_token().await.unwrap(), "tok-1");
    assert_eq!(client.fetch_balance().await.unwrap(), dec("1234.50"));
}

#[tokio::test]
async fn test_gateway_client_reports_failures() {
    let failing = client_for(
        spawn_gateway(StatusCode::BAD_GATEWAY, json!({ "message": "upstream down" })).await,
    );
    assert!(failing.fetch_balance().await.is_err());

    let malformed = client_for(spawn_gateway(StatusCode::OK, json!({ "data": {} })).await);
    assert!(malformed.fetch_balance().await.is_err());

    let mut config = test_config();
    config.gateway_client_secret = String::new();
    let unconfigured = GatewayClient::from_config(&config).unwrap();
    assert!(!unconfigured.is_configured());
    assert!(unconfigured.fetch_balance().await.is_err());
}

#[tokio::test]
async fn test_unreachable_gateway_counts_as_zero_in_the_report() {
    let base_url = spawn_gateway(StatusCode::BAD_GATEWAY, json!({ "message": "upstream down" })).await;
    let mut config = test_config();
    config.gateway_base_url = base_url;
    let gateway = Arc::new(GatewayClient::from_config(&config).unwrap());
    let app = TestApp::with(config, gateway);
    let user_id = app.user("15.00").await;
    app.ledger
        .record_transaction(user_id, dec("15.00"), TransactionType::Deposit, TransactionStatus::Success)
        .await;

    let (status, body) = app
        .send(operator_request("POST", RECONCILIATION_PATH, Some(&operator_token("admin"))))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(field(&body, "/summary/total_gateway_balance"), BigDecimal::zero());
    assert_eq!(body["summary"]["matched"], false);
}

#[tokio::test]
async fn test_gateway_status_through_the_real_client() {
    let base_url = spawn_gateway(StatusCode::OK, json!({ "data": { "amount": 42.5 } })).await;
    let mut config = test_config();
    config.gateway_base_url = base_url;
    let gateway = Arc::new(GatewayClient::from_config(&config).unwrap());
    let app = TestApp::with(config, gateway);

    let uri = format!("{}/gateway-status", RECONCILIATION_PATH);
    let (status, body) = app
        .send(operator_request("GET", &uri, Some(&operator_token("admin"))))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configured"], true);
    assert_eq!(body["token_acquired"], true);
    assert_eq!(field(&body, "/balance"), dec("42.5"));
}
