// service/classifier.rs
use bigdecimal::BigDecimal;
use num_traits::Zero;
use reqwest::Url;
use uuid::Uuid;

use crate::{
    dtos::webhookdtos::GatewayEvent,
    models::ledgermodels::TransactionType,
    service::error::ServiceError,
};

/// Event types that credit the merchant's wallet.
pub const DEPOSIT_EVENT_TYPES: &[&str] = &["payment_success", "deposit_success"];

#[derive(Debug, Clone, PartialEq)]
pub struct DepositEvent {
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub fee: BigDecimal,
    pub transaction_type: TransactionType,
    pub reference: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoicePaymentEvent {
    pub order_reference: String,
    pub reference: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventClass {
    InvoicePayment(InvoicePaymentEvent),
    Deposit(DepositEvent),
    Ignored { event_type: String },
}

/// An order reference always wins over `event_type`.
pub fn classify(event: &GatewayEvent) -> Result<EventClass, ServiceError> {
    if let Some(order_reference) = event.order_reference() {
        let reference = event
            .transaction_id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("INV-{}", order_reference));

        return Ok(EventClass::InvoicePayment(InvoicePaymentEvent {
            order_reference: order_reference.to_string(),
            description: format!("Invoice {} paid via gateway", order_reference),
            reference,
        }));
    }

    if !DEPOSIT_EVENT_TYPES.contains(&event.event_type.trim()) {
        return Ok(EventClass::Ignored {
            event_type: event.event_type.clone(),
        });
    }

    let user_id = resolve_user(event).ok_or_else(|| {
        tracing::error!(
            "Cannot resolve user for {} event (request {:?}, transaction {:?}); needs manual review",
            event.event_type,
            event.request_id,
            event.transaction.id
        );
        ServiceError::UnresolvableUser
    })?;

    let transaction_type = deposit_type(event);
    let reference = deposit_reference(event);

    let mut description = format!("Wallet funding ({})", transaction_type.to_str());
    if let Some(merchant_tx_ref) = &event.transaction.merchant_tx_ref {
        description.push_str(&format!(" merchant ref {}", merchant_tx_ref.trim()));
    }

    Ok(EventClass::Deposit(DepositEvent {
        user_id,
        amount: event.transaction.amount.clone().unwrap_or_else(BigDecimal::zero),
        fee: event.transaction.fee.clone().unwrap_or_else(BigDecimal::zero),
        transaction_type,
        reference,
        description,
    }))
}

/// Candidates in priority order: the callback URL's `userId`, the alias
/// account reference, then the merchant user id. Non-UUID candidates are skipped.
pub fn resolve_user(event: &GatewayEvent) -> Option<Uuid> {
    let callback_user = event
        .order
        .as_ref()
        .and_then(|order| order.callback_url.as_deref())
        .and_then(callback_user_id);

    [
        callback_user,
        event.alias_account_reference.clone(),
        event.merchant_user_id.clone(),
    ]
    .into_iter()
    .flatten()
    .find_map(|candidate| match Uuid::parse_str(candidate.trim()) {
        Ok(user_id) => Some(user_id),
        Err(_) => {
            tracing::debug!("Skipping non-UUID user candidate '{}'", candidate);
            None
        }
    })
}

/// Reads `userId` from a callback URL. Relative URLs are accepted.
pub fn callback_user_id(callback_url: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = base.join(callback_url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "userId")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Only card and bank terms change the tag; everything else is a plain deposit.
fn deposit_type(event: &GatewayEvent) -> TransactionType {
    let payment_method = event
        .order
        .as_ref()
        .and_then(|order| order.payment_method.as_deref());

    [payment_method, event.transaction.kind.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(TransactionType::from_gateway)
        .find(|kind| {
            matches!(
                kind,
                TransactionType::CardDeposit | TransactionType::BankDeposit
            )
        })
        .unwrap_or(TransactionType::Deposit)
}

/// The gateway transaction id, or a digest of the payload when the gateway
/// omits it. Never derived from the clock, so redeliveries collapse.
fn deposit_reference(event: &GatewayEvent) -> String {
    event
        .transaction_id()
        .map(str::to_string)
        .unwrap_or_else(|| format!("evt_{}", event.content_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::str::FromStr;

    fn event(payload: Value) -> GatewayEvent {
        GatewayEvent::from_payload(&payload)
    }

    #[test]
    fn order_reference_beats_event_type() {
        let class = classify(&event(json!({
            "event_type": "subscription_renewed",
            "data": {
                "order": { "orderReference": "ORD-1" },
                "transaction": { "transactionId": "tx-1" }
            }
        })))
        .unwrap();

        match class {
            EventClass::InvoicePayment(invoice) => {
                assert_eq!(invoice.order_reference, "ORD-1");
                assert_eq!(invoice.reference, "tx-1");
            }
            other => panic!("expected invoice payment, got {:?}", other),
        }
    }

    #[test]
    fn invoice_reference_falls_back_to_order() {
        let class = classify(&event(json!({ "data": { "order": { "orderId": "ORD-2" } } }))).unwrap();
        match class {
            EventClass::InvoicePayment(invoice) => assert_eq!(invoice.reference, "INV-ORD-2"),
            other => panic!("expected invoice payment, got {:?}", other),
        }
    }

    #[test]
    fn unknown_event_types_are_ignored() {
        let class = classify(&event(json!({ "event_type": "subscription_renewed" }))).unwrap();
        assert_eq!(
            class,
            EventClass::Ignored {
                event_type: "subscription_renewed".to_string()
            }
        );
    }

    #[test]
    fn deposit_without_a_user_is_unresolvable() {
        let result = classify(&event(json!({
            "event_type": "payment_success",
            "data": { "merchant": { "userId": "not-a-uuid" } }
        })));
        assert!(matches!(result, Err(ServiceError::UnresolvableUser)));
    }

    #[test]
    fn user_resolution_follows_priority() {
        let callback = Uuid::new_v4();
        let alias = Uuid::new_v4();
        let merchant = Uuid::new_v4();

        let full = event(json!({
            "data": {
                "order": { "callbackUrl": format!("https://app.example/pay/done?ref=1&userId={}", callback) },
                "aliasAccountReference": alias.to_string(),
                "merchant": { "userId": merchant.to_string() }
            }
        }));
        assert_eq!(resolve_user(&full), Some(callback));

        let bad_callback = event(json!({
            "data": {
                "order": { "callbackUrl": "/pay/done?userId=guest" },
                "aliasAccountReference": alias.to_string(),
                "merchant": { "userId": merchant.to_string() }
            }
        }));
        assert_eq!(resolve_user(&bad_callback), Some(alias));

        let merchant_only = event(json!({ "data": { "merchant": { "userId": merchant.to_string() } } }));
        assert_eq!(resolve_user(&merchant_only), Some(merchant));
    }

    #[test]
    fn callback_user_id_handles_relative_urls() {
        assert_eq!(callback_user_id("/done?userId=abc").as_deref(), Some("abc"));
        assert_eq!(callback_user_id("https://x.test/?userId=").as_deref(), None);
        assert_eq!(callback_user_id("https://x.test/?other=1"), None);
    }

    #[test]
    fn deposit_fields_and_tagging() {
        let user_id = Uuid::new_v4();
        let class = classify(&event(json!({
            "event_type": "deposit_success",
            "data": {
                "merchant": { "userId": user_id.to_string() },
                "transaction": { "id": "tx-9", "type": "CREDIT", "transactionAmount": "500.00", "fee": 2.5 },
                "order": { "paymentMethod": "bank_transfer" }
            }
        })));

        // paymentMethod without an order reference still tags the deposit
        match class.unwrap() {
            EventClass::Deposit(deposit) => {
                assert_eq!(deposit.user_id, user_id);
                assert_eq!(deposit.reference, "tx-9");
                assert_eq!(deposit.amount, BigDecimal::from_str("500.00").unwrap());
                assert_eq!(deposit.fee, BigDecimal::from_str("2.5").unwrap());
                assert_eq!(deposit.transaction_type, TransactionType::BankDeposit);
            }
            other => panic!("expected deposit, got {:?}", other),
        }
    }

    #[test]
    fn missing_transaction_id_uses_a_stable_digest() {
        let user_id = Uuid::new_v4().to_string();
        let a = event(json!({ "event_type": "payment_success", "data": { "merchant": { "userId": user_id } } }));
        let b = event(json!({ "data": { "merchant": { "userId": user_id } }, "event_type": "payment_success" }));

        let reference = |e: &GatewayEvent| match classify(e).unwrap() {
            EventClass::Deposit(deposit) => deposit.reference,
            other => panic!("expected deposit, got {:?}", other),
        };

        assert!(reference(&a).starts_with("evt_"));
        assert_eq!(reference(&a), reference(&b));
    }

    #[test]
    fn card_type_from_transaction() {
        let user_id = Uuid::new_v4();
        let class = classify(&event(json!({
            "event_type": "payment_success",
            "data": {
                "merchant": { "userId": user_id.to_string() },
                "transaction": { "transactionId": "t", "type": "card" }
            }
        })))
        .unwrap();
        match class {
            EventClass::Deposit(deposit) => {
                assert_eq!(deposit.transaction_type, TransactionType::CardDeposit);
                assert_eq!(deposit.amount, BigDecimal::zero());
            }
            other => panic!("expected deposit, got {:?}", other),
        }
    }
}
