// db/ledgerdb.rs
use async_trait::async_trait;
use sqlx::{Error, Postgres, Row};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::ledgermodels::*;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, amount, transaction_type, status, reference, description, created_at";

const INVOICE_COLUMNS: &str =
    "id, user_id, order_reference, total_amount, status, paid_at, transaction_id";

#[async_trait]
pub trait LedgerExt: Send + Sync {
    // Idempotency guard
    async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, Error>;

    /// Inserts a success transaction and increments the owner's wallet balance
    /// as one unit. Reports `Duplicate` when the reference already exists.
    async fn credit_wallet_atomic(&self, credit: NewCredit) -> Result<CreditOutcome, Error>;

    /// Marks the invoice paid, credits its owner by the invoice total and
    /// records the transaction, all in one unit.
    async fn settle_invoice_payment(
        &self,
        settlement: InvoiceSettlement,
    ) -> Result<SettlementOutcome, Error>;

    // Reconciliation
    async fn get_wallet_balances(&self) -> Result<Vec<UserBalance>, Error>;

    async fn get_successful_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>, Error>;
}

#[async_trait]
impl LedgerExt for DBClient {
    async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {} FROM transactions WHERE reference = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
    }

    async fn credit_wallet_atomic(&self, credit: NewCredit) -> Result<CreditOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent credits for the same user
        let user = sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(credit.user_id)
            .fetch_optional(&mut *tx)
            .await?;

        if user.is_none() {
            tx.rollback().await?;
            return Ok(CreditOutcome::UnknownUser);
        }

        let transaction = insert_success_transaction(
            &mut tx,
            credit.user_id,
            &credit.amount,
            credit.transaction_type,
            &credit.reference,
            &credit.description,
        )
        .await?;

        let Some(transaction) = transaction else {
            tx.rollback().await?;
            return Ok(CreditOutcome::Duplicate);
        };

        increment_wallet_balance(&mut tx, credit.user_id, &credit.amount).await?;

        tx.commit().await?;
        Ok(CreditOutcome::Credited(transaction))
    }

    async fn settle_invoice_payment(
        &self,
        settlement: InvoiceSettlement,
    ) -> Result<SettlementOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE order_reference = $1 FOR UPDATE",
            INVOICE_COLUMNS
        ))
        .bind(&settlement.order_reference)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(invoice) = invoice else {
            tx.rollback().await?;
            return Ok(SettlementOutcome::NotFound);
        };

        if invoice.status == InvoiceStatus::Paid {
            tx.rollback().await?;
            return Ok(SettlementOutcome::AlreadyPaid);
        }

        if invoice.total_amount <= bigdecimal::BigDecimal::from(0) {
            tx.rollback().await?;
            return Ok(SettlementOutcome::NonPositiveTotal);
        }

        // The owner must exist; a dangling invoice is a data error, not a no-op
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(invoice.user_id)
            .fetch_one(&mut *tx)
            .await?;

        let transaction = insert_success_transaction(
            &mut tx,
            invoice.user_id,
            &invoice.total_amount,
            TransactionType::InvoicePayment,
            &settlement.reference,
            &settlement.description,
        )
        .await?;

        let Some(transaction) = transaction else {
            tx.rollback().await?;
            return Ok(SettlementOutcome::Duplicate);
        };

        increment_wallet_balance(&mut tx, invoice.user_id, &invoice.total_amount).await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'paid'::invoice_status,
                paid_at = NOW(),
                transaction_id = $2,
                updated_at = NOW()
            WHERE id = $1 AND status <> 'paid'::invoice_status
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice.id)
        .bind(transaction.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(SettlementOutcome::Settled {
            invoice,
            transaction,
        })
    }

    async fn get_wallet_balances(&self) -> Result<Vec<UserBalance>, Error> {
        sqlx::query_as::<_, UserBalance>(
            r#"
            SELECT id AS user_id, wallet_balance
            FROM users
            WHERE wallet_balance IS NOT NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_successful_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>, Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE user_id = $1 AND status = 'success'::transaction_status
            ORDER BY created_at
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}

/// Returns `None` when a row with the same reference already exists.
async fn insert_success_transaction(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: &bigdecimal::BigDecimal,
    transaction_type: TransactionType,
    reference: &str,
    description: &str,
) -> Result<Option<Transaction>, Error> {
    sqlx::query_as::<_, Transaction>(&format!(
        r#"
        INSERT INTO transactions
        (user_id, amount, transaction_type, status, reference, description)
        VALUES ($1, $2, $3, 'success'::transaction_status, $4, $5)
        ON CONFLICT (reference) DO NOTHING
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(user_id)
    .bind(amount)
    .bind(transaction_type)
    .bind(reference)
    .bind(description)
    .fetch_optional(&mut **tx)
    .await
}

async fn increment_wallet_balance(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: &bigdecimal::BigDecimal,
) -> Result<(), Error> {
    let row = sqlx::query(
        r#"
        UPDATE users
        SET wallet_balance = COALESCE(wallet_balance, 0) + $2,
            updated_at = NOW()
        WHERE id = $1
        RETURNING wallet_balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut **tx)
    .await?;

    tracing::debug!(
        "Wallet {} balance is now {}",
        user_id,
        row.get::<bigdecimal::BigDecimal, _>("wallet_balance")
    );
    Ok(())
}
