// dtos/reconciliationdtos.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReconciliationStatus {
    Ok,
    Discrepancy,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserReconciliation {
    pub user_id: Uuid,
    pub system_balance: BigDecimal,
    pub gateway_balance: Option<BigDecimal>,
    pub difference: Option<BigDecimal>,
    pub status: ReconciliationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconciliationSummary {
    pub total_system_balance: BigDecimal,
    pub total_gateway_balance: BigDecimal,
    pub difference: BigDecimal,
    pub matched: bool,
    pub users_checked: usize,
    pub discrepancy_count: usize,
    pub error_count: usize,
    pub run_by: String,
    pub run_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconciliationReport {
    pub summary: ReconciliationSummary,
    pub users: Vec<UserReconciliation>,
    /// Whether this report was served from the cache.
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayStatus {
    pub configured: bool,
    pub token_acquired: bool,
    pub balance: BigDecimal,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RunReconciliationQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub ok: bool,
    pub cleared: Vec<String>,
}
