// db/memory.rs
//! In-memory ledger used for local runs (`DATABASE_URL=memory`) and tests.
//!
//! Every operation holds one async lock for its whole duration, which gives the
//! same all-or-nothing behaviour the Postgres implementation gets from a
//! database transaction.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use num_traits::Zero;
use sqlx::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::ledgerdb::LedgerExt;
use crate::models::ledgermodels::*;

#[derive(Default)]
struct LedgerState {
    // None means the user has no wallet yet
    wallets: HashMap<Uuid, Option<BigDecimal>>,
    transactions: Vec<Transaction>,
    invoices: HashMap<String, Invoice>,
    failing_users: HashSet<Uuid>,
    fail_writes: bool,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

fn injected_failure() -> Error {
    Error::Protocol("injected ledger failure".to_string())
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: Uuid, wallet_balance: Option<BigDecimal>) {
        self.state.lock().await.wallets.insert(user_id, wallet_balance);
    }

    pub async fn wallet_balance(&self, user_id: Uuid) -> Option<BigDecimal> {
        self.state.lock().await.wallets.get(&user_id).cloned().flatten()
    }

    pub async fn add_invoice(&self, invoice: Invoice) {
        self.state
            .lock()
            .await
            .invoices
            .insert(invoice.order_reference.clone(), invoice);
    }

    pub async fn invoice(&self, order_reference: &str) -> Option<Invoice> {
        self.state.lock().await.invoices.get(order_reference).cloned()
    }

    /// Records a historical transaction without touching the wallet balance.
    pub async fn record_transaction(
        &self,
        user_id: Uuid,
        amount: BigDecimal,
        transaction_type: TransactionType,
        status: TransactionStatus,
    ) -> Transaction {
        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id,
            amount,
            transaction_type,
            status,
            reference: format!("seed-{}", Uuid::new_v4()),
            description: None,
            created_at: Utc::now(),
        };
        self.state.lock().await.transactions.push(transaction.clone());
        transaction
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().await.transactions.clone()
    }

    /// Makes transaction lookups for `user_id` fail.
    pub async fn fail_lookups_for(&self, user_id: Uuid) {
        self.state.lock().await.failing_users.insert(user_id);
    }

    /// Makes every write (and the reference lookup) fail.
    pub async fn fail_writes(&self, enabled: bool) {
        self.state.lock().await.fail_writes = enabled;
    }
}

impl LedgerState {
    fn reference_exists(&self, reference: &str) -> bool {
        self.transactions.iter().any(|t| t.reference == reference)
    }

    fn push_success(
        &mut self,
        user_id: Uuid,
        amount: &BigDecimal,
        transaction_type: TransactionType,
        reference: &str,
        description: &str,
    ) -> Transaction {
        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id,
            amount: amount.clone(),
            transaction_type,
            status: TransactionStatus::Success,
            reference: reference.to_string(),
            description: Some(description.to_string()),
            created_at: Utc::now(),
        };
        self.transactions.push(transaction.clone());

        let balance = self.wallets.entry(user_id).or_insert(None);
        let current = balance.take().unwrap_or_else(BigDecimal::zero);
        *balance = Some(current + amount);

        transaction
    }
}

#[async_trait]
impl LedgerExt for MemoryLedger {
    async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, Error> {
        let state = self.state.lock().await;
        if state.fail_writes {
            return Err(injected_failure());
        }
        Ok(state
            .transactions
            .iter()
            .find(|t| t.reference == reference)
            .cloned())
    }

    async fn credit_wallet_atomic(&self, credit: NewCredit) -> Result<CreditOutcome, Error> {
        let mut state = self.state.lock().await;
        // Give racing callers a chance to queue up on the lock
        tokio::task::yield_now().await;

        if state.fail_writes {
            return Err(injected_failure());
        }
        if !state.wallets.contains_key(&credit.user_id) {
            return Ok(CreditOutcome::UnknownUser);
        }
        if state.reference_exists(&credit.reference) {
            return Ok(CreditOutcome::Duplicate);
        }

        let transaction = state.push_success(
            credit.user_id,
            &credit.amount,
            credit.transaction_type,
            &credit.reference,
            &credit.description,
        );
        Ok(CreditOutcome::Credited(transaction))
    }

    async fn settle_invoice_payment(
        &self,
        settlement: InvoiceSettlement,
    ) -> Result<SettlementOutcome, Error> {
        let mut state = self.state.lock().await;
        tokio::task::yield_now().await;

        if state.fail_writes {
            return Err(injected_failure());
        }

        let Some(invoice) = state.invoices.get(&settlement.order_reference).cloned() else {
            return Ok(SettlementOutcome::NotFound);
        };
        if invoice.status == InvoiceStatus::Paid {
            return Ok(SettlementOutcome::AlreadyPaid);
        }
        if invoice.total_amount <= BigDecimal::zero() {
            return Ok(SettlementOutcome::NonPositiveTotal);
        }
        if !state.wallets.contains_key(&invoice.user_id) {
            return Err(Error::RowNotFound);
        }
        if state.reference_exists(&settlement.reference) {
            return Ok(SettlementOutcome::Duplicate);
        }

        let transaction = state.push_success(
            invoice.user_id,
            &invoice.total_amount,
            TransactionType::InvoicePayment,
            &settlement.reference,
            &settlement.description,
        );

        let invoice = Invoice {
            status: InvoiceStatus::Paid,
            paid_at: Some(Utc::now()),
            transaction_id: Some(transaction.id),
            ..invoice
        };
        state
            .invoices
            .insert(invoice.order_reference.clone(), invoice.clone());

        Ok(SettlementOutcome::Settled {
            invoice,
            transaction,
        })
    }

    async fn get_wallet_balances(&self) -> Result<Vec<UserBalance>, Error> {
        let state = self.state.lock().await;
        let mut balances: Vec<UserBalance> = state
            .wallets
            .iter()
            .filter_map(|(user_id, balance)| {
                balance.as_ref().map(|wallet_balance| UserBalance {
                    user_id: *user_id,
                    wallet_balance: wallet_balance.clone(),
                })
            })
            .collect();
        balances.sort_by_key(|balance| balance.user_id);
        Ok(balances)
    }

    async fn get_successful_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>, Error> {
        let state = self.state.lock().await;
        if state.failing_users.contains(&user_id) {
            return Err(injected_failure());
        }
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && t.status == TransactionStatus::Success)
            .cloned()
            .collect())
    }
}
