// service/ledger_service.rs
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use num_traits::Signed;
use uuid::Uuid;

use crate::{
    db::{query_timeout::QueryTimeout, LedgerExt},
    models::ledgermodels::{CreditOutcome, InvoiceSettlement, NewCredit, SettlementOutcome},
    service::{
        classifier::{DepositEvent, EventClass, InvoicePaymentEvent},
        error::ServiceError,
    },
    utils::currency::{net_amount, round_to_minor_unit},
};

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Credited {
        user_id: Uuid,
        reference: String,
        amount: BigDecimal,
    },
    Duplicate {
        reference: String,
    },
    InvoiceSettled {
        order_reference: String,
        reference: String,
    },
    InvoiceAlreadyPaid {
        order_reference: String,
    },
    InvoiceNotFound {
        order_reference: String,
    },
    Ignored {
        event_type: String,
    },
}

pub struct LedgerService {
    db_client: Arc<dyn LedgerExt>,
    query_timeout: Duration,
}

impl LedgerService {
    pub fn new(db_client: Arc<dyn LedgerExt>, query_timeout: Duration) -> Self {
        Self {
            db_client,
            query_timeout,
        }
    }

    pub async fn process(&self, event: EventClass) -> Result<WebhookOutcome, ServiceError> {
        let result = match event {
            EventClass::Deposit(deposit) => self.credit_deposit(deposit).await,
            EventClass::InvoicePayment(invoice) => self.settle_invoice(invoice).await,
            EventClass::Ignored { event_type } => {
                tracing::info!("Ignoring gateway event '{}'", event_type);
                Ok(WebhookOutcome::Ignored { event_type })
            }
        };

        if let Err(e) = &result {
            if e.is_retryable() {
                tracing::error!("Failed to record gateway event, gateway will redeliver: {}", e);
            }
        }
        result
    }

    async fn credit_deposit(&self, deposit: DepositEvent) -> Result<WebhookOutcome, ServiceError> {
        for (field, value) in [("amount", &deposit.amount), ("fee", &deposit.fee)] {
            if value.is_negative() {
                tracing::warn!(
                    "Rejecting deposit {}: negative {} {}",
                    deposit.reference,
                    field,
                    value
                );
                return Err(ServiceError::NegativeAmount(field.to_string()));
            }
        }

        let amount = net_amount(&deposit.amount, &deposit.fee).ok_or_else(|| {
            let net = round_to_minor_unit(&(&deposit.amount - &deposit.fee));
            tracing::warn!(
                "Rejecting deposit {}: amount {} minus fee {} is {}",
                deposit.reference,
                deposit.amount,
                deposit.fee,
                net
            );
            ServiceError::NonPositiveAmount(net.to_string())
        })?;

        let existing = QueryTimeout::execute_with_timeout(
            self.db_client.get_transaction_by_reference(&deposit.reference),
            self.query_timeout,
        )
        .await?;

        if existing.is_some() {
            tracing::info!("Duplicate deposit {} acknowledged", deposit.reference);
            return Ok(WebhookOutcome::Duplicate {
                reference: deposit.reference,
            });
        }

        let credit = NewCredit {
            user_id: deposit.user_id,
            amount: amount.clone(),
            transaction_type: deposit.transaction_type,
            reference: deposit.reference.clone(),
            description: deposit.description,
        };

        let outcome = QueryTimeout::execute_with_timeout(
            self.db_client.credit_wallet_atomic(credit),
            self.query_timeout,
        )
        .await?;

        match outcome {
            CreditOutcome::Credited(transaction) => {
                tracing::info!(
                    "Credited {} to user {} ({}, reference {})",
                    transaction.amount,
                    transaction.user_id,
                    transaction.transaction_type.to_str(),
                    transaction.reference
                );
                Ok(WebhookOutcome::Credited {
                    user_id: transaction.user_id,
                    reference: transaction.reference,
                    amount,
                })
            }
            // Lost a race with a concurrent delivery of the same event
            CreditOutcome::Duplicate => {
                tracing::info!("Concurrent duplicate deposit {} acknowledged", deposit.reference);
                Ok(WebhookOutcome::Duplicate {
                    reference: deposit.reference,
                })
            }
            CreditOutcome::UnknownUser => {
                tracing::error!(
                    "Deposit {} targets unknown user {}",
                    deposit.reference,
                    deposit.user_id
                );
                Err(ServiceError::UnknownUser(deposit.user_id))
            }
        }
    }

    async fn settle_invoice(&self, invoice: InvoicePaymentEvent) -> Result<WebhookOutcome, ServiceError> {
        let settlement = InvoiceSettlement {
            order_reference: invoice.order_reference.clone(),
            reference: invoice.reference.clone(),
            description: invoice.description,
        };

        let outcome = QueryTimeout::execute_with_timeout(
            self.db_client.settle_invoice_payment(settlement),
            self.query_timeout,
        )
        .await?;

        let order_reference = invoice.order_reference;
        match outcome {
            SettlementOutcome::Settled { invoice, transaction } => {
                tracing::info!(
                    "Invoice {} paid: credited {} to user {} (reference {})",
                    invoice.order_reference,
                    transaction.amount,
                    invoice.user_id,
                    transaction.reference
                );
                Ok(WebhookOutcome::InvoiceSettled {
                    order_reference,
                    reference: transaction.reference,
                })
            }
            SettlementOutcome::AlreadyPaid => {
                tracing::info!("Invoice {} already paid", order_reference);
                Ok(WebhookOutcome::InvoiceAlreadyPaid { order_reference })
            }
            SettlementOutcome::NotFound => {
                tracing::warn!("Payment received for unknown invoice {}", order_reference);
                Ok(WebhookOutcome::InvoiceNotFound { order_reference })
            }
            SettlementOutcome::Duplicate => {
                tracing::info!("Duplicate invoice payment {} acknowledged", invoice.reference);
                Ok(WebhookOutcome::Duplicate {
                    reference: invoice.reference,
                })
            }
            SettlementOutcome::NonPositiveTotal => {
                tracing::warn!("Invoice {} has a non-positive total", order_reference);
                Err(ServiceError::NonPositiveInvoiceTotal(order_reference))
            }
        }
    }
}
