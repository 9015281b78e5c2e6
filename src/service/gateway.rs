// service/gateway.rs
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::Value;

use crate::{config::Config, service::error::ServiceError, utils::currency::parse_amount};

const TOKEN_PATH: &str = "/v1/auth/token/issue";
const BALANCE_PATH: &str = "/v1/accounts/balance";
const ACCOUNT_ID_HEADER: &str = "accountId";

/// Source of the gateway's authoritative aggregate balance.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn access_token(&self) -> Result<String, ServiceError>;

    async fn balance_with_token(&self, token: &str) -> Result<BigDecimal, ServiceError>;

    /// Token then balance. Unconfigured credentials are an error.
    async fn fetch_balance(&self) -> Result<BigDecimal, ServiceError> {
        if !self.is_configured() {
            return Err(ServiceError::Gateway("gateway credentials are not configured".to_string()));
        }
        let token = self.access_token().await?;
        self.balance_with_token(&token).await
    }
}

pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    account_id: String,
}

impl GatewayClient {
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.gateway_base_url.trim_end_matches('/').to_string(),
            client_id: config.gateway_client_id.clone(),
            client_secret: config.gateway_client_secret.clone(),
            account_id: config.gateway_account_id.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json(response: reqwest::Response, what: &str) -> Result<Value, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Gateway(format!(
                "{} request failed with {}: {}",
                what, status, body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ServiceError::Gateway(format!("{} response is not JSON: {}", what, e)))
    }
}

#[async_trait]
impl BalanceProvider for GatewayClient {
    fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty() && !self.account_id.is_empty()
    }

    async fn access_token(&self) -> Result<String, ServiceError> {
        let payload = serde_json::json!({
            "grant_type": "client_credentials",
            "client_id": self.client_id,
            "client_secret": self.client_secret,
        });

        let response = self
            .http
            .post(self.url(TOKEN_PATH))
            .header(ACCOUNT_ID_HEADER, &self.account_id)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(format!("token request failed: {}", e)))?;

        let body = Self::read_json(response, "token").await?;

        body.pointer("/data/access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Gateway("token response has no access_token".to_string()))
    }

    async fn balance_with_token(&self, token: &str) -> Result<BigDecimal, ServiceError> {
        let response = self
            .http
            .get(self.url(BALANCE_PATH))
            .bearer_auth(token)
            .header(ACCOUNT_ID_HEADER, &self.account_id)
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(format!("balance request failed: {}", e)))?;

        let body = Self::read_json(response, "balance").await?;

        body.pointer("/data/amount")
            .and_then(parse_amount)
            .ok_or_else(|| ServiceError::Gateway("balance response has no numeric amount".to_string()))
    }
}
