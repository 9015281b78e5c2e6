//! Shared fixtures for the HTTP-level tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub use ledgerhook::config::Config;
pub use ledgerhook::db::{cache::MemoryCache, memory::MemoryLedger};
pub use ledgerhook::dtos::webhookdtos::GatewayEvent;
pub use ledgerhook::models::ledgermodels::*;
pub use ledgerhook::service::error::ServiceError;
pub use ledgerhook::service::gateway::BalanceProvider;
pub use ledgerhook::service::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use ledgerhook::utils::token::TokenClaims;
use ledgerhook::{routes::create_router, AppState};

pub const SIGNING_KEY: &str = "whsec_integration";
pub const JWT_SECRET: &str = "jwt-integration-secret";
pub const TIMESTAMP: &str = "1714557600";
pub const WEBHOOK_PATH: &str = "/api/webhooks/gateway";
pub const RECONCILIATION_PATH: &str = "/api/admin/reconciliation";

pub fn test_config() -> Config {
    Config {
        database_url: "memory".to_string(),
        redis_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        port: 0,
        log_level: "debug".to_string(),
        allowed_origins: vec![],
        gateway_signing_key: Some(SIGNING_KEY.to_string()),
        gateway_base_url: "http://127.0.0.1:9".to_string(),
        gateway_client_id: "client".to_string(),
        gateway_client_secret: "secret".to_string(),
        gateway_account_id: "acct-1".to_string(),
        gateway_timeout_secs: 2,
        reconciliation_cache_ttl_secs: 300,
        gateway_balance_cache_ttl_secs: 60,
        reconciliation_interval_secs: 0,
        query_timeout_ms: 2000,
    }
}

pub fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

/// Gateway stand-in that always reports the same balance.
pub struct StaticGateway {
    pub balance: BigDecimal,
}

#[async_trait]
impl BalanceProvider for StaticGateway {
    fn is_configured(&self) -> bool {
        true
    }

    async fn access_token(&self) -> Result<String, ServiceError> {
        Ok("static-token".to_string())
    }

    async fn balance_with_token(&self, _token: &str) -> Result<BigDecimal, ServiceError> {
        Ok(self.balance.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub ledger: Arc<MemoryLedger>,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(test_config(), Arc::new(StaticGateway { balance: BigDecimal::from(0) }))
    }

    pub fn with(config: Config, gateway: Arc<dyn BalanceProvider>) -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        let state = Arc::new(AppState::new(
            config,
            ledger.clone(),
            Arc::new(MemoryCache::new()),
            gateway,
        ));
        TestApp {
            router: create_router(state.clone()),
            ledger,
            state,
        }
    }

    pub async fn user(&self, balance: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.ledger.add_user(user_id, Some(dec(balance))).await;
        user_id
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

pub fn sign_payload(payload: &Value, key: &str, timestamp: &str) -> String {
    let event = GatewayEvent::from_payload(payload);
    SignatureVerifier::new(key).sign(&SignatureVerifier::canonical_string(&event, timestamp))
}

pub fn webhook_request(payload: &Value) -> Request<Body> {
    let signature = sign_payload(payload, SIGNING_KEY, TIMESTAMP);
    webhook_request_with(payload.to_string(), Some(&signature), Some(TIMESTAMP))
}

pub fn webhook_request_with(
    body: String,
    signature: Option<&str>,
    timestamp: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    if let Some(timestamp) = timestamp {
        builder = builder.header(TIMESTAMP_HEADER, timestamp);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn deposit_payload(user_id: Uuid, transaction_id: &str, amount: Value, fee: Value) -> Value {
    serde_json::json!({
        "event_type": "payment_success",
        "requestId": format!("req-{}", transaction_id),
        "data": {
            "merchant": { "userId": user_id.to_string(), "walletId": "wallet-1" },
            "transaction": {
                "transactionId": transaction_id,
                "type": "CREDIT",
                "time": "2024-05-01T10:00:00Z",
                "responseCode": "00",
                "transactionAmount": amount,
                "fee": fee
            }
        }
    })
}

pub fn operator_token(role: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        sub: format!("{}-operator", role),
        role: role.to_string(),
        exp: (now + 600) as usize,
        iat: now as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

pub fn operator_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}
