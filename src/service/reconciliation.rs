// service/reconciliation.rs
//! Ledger reconciliation.
//!
//! Each user's stored wallet balance is checked against the balance implied by
//! their successful transactions, and the sum of all stored balances is checked
//! against the gateway's aggregate balance. Reports are cached briefly because
//! a run touches every wallet.

use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::Utc;
use futures::{stream, StreamExt};
use num_traits::Zero;

use crate::{
    db::{
        cache::{CacheHelper, CacheStore},
        LedgerExt,
    },
    dtos::reconciliationdtos::{
        GatewayStatus, ReconciliationReport, ReconciliationStatus, ReconciliationSummary,
        UserReconciliation,
    },
    models::ledgermodels::UserBalance,
    service::{error::ServiceError, gateway::BalanceProvider},
    utils::currency::{floor_at_zero, round_to_minor_unit, within_tolerance},
};

pub const REPORT_CACHE_KEY: &str = "reconciliation:report";
pub const GATEWAY_BALANCE_CACHE_KEY: &str = "reconciliation:gateway_balance";

// Users reconciled in parallel
const USER_CONCURRENCY: usize = 8;

pub struct ReconciliationService {
    db_client: Arc<dyn LedgerExt>,
    gateway: Arc<dyn BalanceProvider>,
    cache: Arc<dyn CacheStore>,
    report_ttl: Duration,
    gateway_balance_ttl: Duration,
}

impl ReconciliationService {
    pub fn new(
        db_client: Arc<dyn LedgerExt>,
        gateway: Arc<dyn BalanceProvider>,
        cache: Arc<dyn CacheStore>,
        report_ttl: Duration,
        gateway_balance_ttl: Duration,
    ) -> Self {
        Self {
            db_client,
            gateway,
            cache,
            report_ttl,
            gateway_balance_ttl,
        }
    }

    /// Returns the cached report unless `force_refresh` is set. A forced run
    /// also drops the cached gateway balance so both sides are fresh.
    pub async fn run(
        &self,
        run_by: &str,
        force_refresh: bool,
    ) -> Result<ReconciliationReport, ServiceError> {
        if force_refresh {
            CacheHelper::delete(self.cache.as_ref(), GATEWAY_BALANCE_CACHE_KEY).await;
        } else if let Some(mut report) =
            CacheHelper::get::<ReconciliationReport>(self.cache.as_ref(), REPORT_CACHE_KEY).await
        {
            report.cached = true;
            return Ok(report);
        }

        let report = self.reconcile(run_by).await?;

        CacheHelper::set(self.cache.as_ref(), REPORT_CACHE_KEY, &report, self.report_ttl).await;
        Ok(report)
    }

    async fn reconcile(&self, run_by: &str) -> Result<ReconciliationReport, ServiceError> {
        let balances = self.db_client.get_wallet_balances().await?;

        let total_system_balance = balances
            .iter()
            .fold(BigDecimal::zero(), |total, balance| total + &balance.wallet_balance);

        let mut users: Vec<UserReconciliation> = stream::iter(balances)
            .map(|balance| self.reconcile_user(balance))
            .buffer_unordered(USER_CONCURRENCY)
            .collect()
            .await;
        users.sort_by_key(|row| row.user_id);

        let total_gateway_balance = self.gateway_balance().await;
        let difference = round_to_minor_unit(&(&total_system_balance - &total_gateway_balance));

        let summary = ReconciliationSummary {
            matched: within_tolerance(&total_system_balance, &total_gateway_balance),
            users_checked: users.len(),
            discrepancy_count: count_status(&users, ReconciliationStatus::Discrepancy),
            error_count: count_status(&users, ReconciliationStatus::Error),
            total_system_balance: round_to_minor_unit(&total_system_balance),
            total_gateway_balance: round_to_minor_unit(&total_gateway_balance),
            difference,
            run_by: run_by.to_string(),
            run_at: Utc::now(),
        };

        tracing::info!(
            "Reconciliation by {}: {} users, {} discrepancies, {} errors, system {} vs gateway {} (matched: {})",
            summary.run_by,
            summary.users_checked,
            summary.discrepancy_count,
            summary.error_count,
            summary.total_system_balance,
            summary.total_gateway_balance,
            summary.matched
        );
        for row in users.iter().filter(|row| row.status == ReconciliationStatus::Discrepancy) {
            tracing::warn!(
                "Balance discrepancy for user {}: system {} vs ledger {:?} (difference {:?})",
                row.user_id,
                row.system_balance,
                row.gateway_balance,
                row.difference
            );
        }

        Ok(ReconciliationReport {
            summary,
            users,
            cached: false,
        })
    }

    async fn reconcile_user(&self, balance: UserBalance) -> UserReconciliation {
        let system_balance = balance.wallet_balance;

        match self.db_client.get_successful_transactions(balance.user_id).await {
            Ok(transactions) => {
                // Compared unrounded; only the reported figures are rounded
                let ledger_balance = floor_at_zero(
                    transactions
                        .iter()
                        .fold(BigDecimal::zero(), |total, tx| total + tx.signed_amount()),
                );
                let difference = round_to_minor_unit(&(&system_balance - &ledger_balance));
                let status = if within_tolerance(&system_balance, &ledger_balance) {
                    ReconciliationStatus::Ok
                } else {
                    ReconciliationStatus::Discrepancy
                };

                UserReconciliation {
                    user_id: balance.user_id,
                    system_balance,
                    gateway_balance: Some(round_to_minor_unit(&ledger_balance)),
                    difference: Some(difference),
                    status,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!("Reconciliation failed for user {}: {}", balance.user_id, e);
                UserReconciliation {
                    user_id: balance.user_id,
                    system_balance,
                    gateway_balance: None,
                    difference: None,
                    status: ReconciliationStatus::Error,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Cached aggregate balance. Failed lookups count as zero and are not cached.
    async fn gateway_balance(&self) -> BigDecimal {
        if let Some(balance) =
            CacheHelper::get::<BigDecimal>(self.cache.as_ref(), GATEWAY_BALANCE_CACHE_KEY).await
        {
            return balance;
        }

        match self.gateway.fetch_balance().await {
            Ok(balance) => {
                CacheHelper::set(
                    self.cache.as_ref(),
                    GATEWAY_BALANCE_CACHE_KEY,
                    &balance,
                    self.gateway_balance_ttl,
                )
                .await;
                balance
            }
            Err(e) => {
                tracing::warn!("Gateway balance unavailable, using 0: {}", e);
                BigDecimal::zero()
            }
        }
    }

    pub async fn clear_cache(&self) -> Vec<String> {
        let keys = [REPORT_CACHE_KEY, GATEWAY_BALANCE_CACHE_KEY];
        for key in keys {
            CacheHelper::delete(self.cache.as_ref(), key).await;
        }
        tracing::info!("Cleared reconciliation cache ({})", self.cache.backend());
        keys.iter().map(|key| key.to_string()).collect()
    }

    /// Uncached token and balance check for operators.
    pub async fn gateway_status(&self) -> GatewayStatus {
        let configured = self.gateway.is_configured();
        let mut token_acquired = false;
        let mut balance = BigDecimal::zero();

        if configured {
            match self.gateway.access_token().await {
                Ok(token) => {
                    token_acquired = true;
                    match self.gateway.balance_with_token(&token).await {
                        Ok(amount) => balance = amount,
                        Err(e) => tracing::warn!("Gateway balance check failed: {}", e),
                    }
                }
                Err(e) => tracing::warn!("Gateway token check failed: {}", e),
            }
        }

        GatewayStatus {
            configured,
            token_acquired,
            balance,
            checked_at: Utc::now(),
        }
    }
}

fn count_status(users: &[UserReconciliation], status: ReconciliationStatus) -> usize {
    users.iter().filter(|row| row.status == status).count()
}
