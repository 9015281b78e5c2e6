// models/ledgermodels.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    CardDeposit,
    BankDeposit,
    InvoicePayment,
    Withdrawal,
    BillPayment,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Credit,
    Debit,
}

/// Gateway (and legacy) vocabulary mapped onto the internal transaction types.
/// Every place that needs to interpret a type string goes through this table.
const GATEWAY_VOCABULARY: &[(&str, TransactionType)] = &[
    ("deposit", TransactionType::Deposit),
    ("credit", TransactionType::Deposit),
    ("wallet_funding", TransactionType::Deposit),
    ("card", TransactionType::CardDeposit),
    ("card_deposit", TransactionType::CardDeposit),
    ("card_payment", TransactionType::CardDeposit),
    ("bank", TransactionType::BankDeposit),
    ("bank_transfer", TransactionType::BankDeposit),
    ("bank_deposit", TransactionType::BankDeposit),
    ("transfer", TransactionType::BankDeposit),
    ("virtual_account", TransactionType::BankDeposit),
    ("invoice_payment", TransactionType::InvoicePayment),
    ("withdrawal", TransactionType::Withdrawal),
    ("debit", TransactionType::Withdrawal),
    ("payout", TransactionType::Withdrawal),
    ("bill_payment", TransactionType::BillPayment),
    ("airtime", TransactionType::BillPayment),
    ("data", TransactionType::BillPayment),
    ("electricity", TransactionType::BillPayment),
    ("cable_tv", TransactionType::BillPayment),
];

impl TransactionType {
    pub fn to_str(&self) -> &str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::CardDeposit => "card_deposit",
            TransactionType::BankDeposit => "bank_deposit",
            TransactionType::InvoicePayment => "invoice_payment",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::BillPayment => "bill_payment",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            TransactionType::Deposit
            | TransactionType::CardDeposit
            | TransactionType::BankDeposit
            | TransactionType::InvoicePayment => Direction::Credit,
            TransactionType::Withdrawal | TransactionType::BillPayment => Direction::Debit,
        }
    }

    /// Maps a gateway term (case-insensitive, `-` and spaces treated as `_`).
    pub fn from_gateway(term: &str) -> Option<TransactionType> {
        let normalized = term.trim().to_lowercase().replace(['-', ' '], "_");
        GATEWAY_VOCABULARY
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, kind)| *kind)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Pending,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Signed,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub reference: String, // Unique, the idempotency key
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount with the sign implied by the transaction type.
    pub fn signed_amount(&self) -> BigDecimal {
        match self.transaction_type.direction() {
            Direction::Credit => self.amount.clone(),
            Direction::Debit => -self.amount.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_reference: String,
    pub total_amount: BigDecimal,
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserBalance {
    pub user_id: Uuid,
    pub wallet_balance: BigDecimal,
}

/// Input for the atomic credit primitive.
#[derive(Debug, Clone)]
pub struct NewCredit {
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub transaction_type: TransactionType,
    pub reference: String,
    pub description: String,
}

/// Input for the atomic invoice settlement.
#[derive(Debug, Clone)]
pub struct InvoiceSettlement {
    pub order_reference: String,
    pub reference: String,
    pub description: String,
}

#[derive(Debug)]
pub enum CreditOutcome {
    Credited(Transaction),
    /// A transaction with the same reference already exists; nothing was changed.
    Duplicate,
    UnknownUser,
}

#[derive(Debug)]
pub enum SettlementOutcome {
    Settled { invoice: Invoice, transaction: Transaction },
    AlreadyPaid,
    NotFound,
    Duplicate,
    NonPositiveTotal,
}
