// dtos/webhookdtos.rs
//! Normalization of the gateway's loosely typed webhook payload.
//!
//! The gateway is inconsistent about field names (`transactionId`,
//! `transaction_id` or `id`; `orderReference` or `orderId`) and about types
//! (ids and amounts arrive as numbers or strings). Everything downstream of
//! [`GatewayEvent::from_payload`] works with one strict shape.

use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::utils::currency::parse_amount;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventTransaction {
    pub id: Option<String>,
    pub kind: Option<String>,
    pub time: Option<String>,
    pub response_code: Option<String>,
    pub amount: Option<BigDecimal>,
    pub fee: Option<BigDecimal>,
    pub merchant_tx_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventOrder {
    pub reference: Option<String>,
    pub amount: Option<BigDecimal>,
    pub payment_method: Option<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GatewayEvent {
    pub event_type: String,
    pub request_id: Option<String>,
    pub merchant_user_id: Option<String>,
    pub merchant_wallet_id: Option<String>,
    pub transaction: EventTransaction,
    pub order: Option<EventOrder>,
    pub alias_account_reference: Option<String>,
    /// Hex SHA-256 of the payload's canonical (key-sorted) JSON form.
    pub content_hash: String,
}

impl GatewayEvent {
    pub fn from_payload(payload: &Value) -> GatewayEvent {
        let transaction = payload.pointer("/data/transaction");
        let order = payload.pointer("/data/order").filter(|order| order.is_object());

        GatewayEvent {
            event_type: text_at(payload, "/event_type").unwrap_or_default(),
            request_id: text_at(payload, "/requestId"),
            merchant_user_id: text_at(payload, "/data/merchant/userId"),
            merchant_wallet_id: text_at(payload, "/data/merchant/walletId"),
            transaction: transaction
                .map(|transaction| EventTransaction {
                    id: first_text(transaction, &["/transactionId", "/transaction_id", "/id"]),
                    kind: text_at(transaction, "/type"),
                    time: text_at(transaction, "/time"),
                    response_code: text_at(transaction, "/responseCode"),
                    amount: transaction.pointer("/transactionAmount").and_then(parse_amount),
                    fee: transaction.pointer("/fee").and_then(parse_amount),
                    merchant_tx_ref: text_at(transaction, "/merchantTxRef"),
                })
                .unwrap_or_default(),
            order: order.map(|order| EventOrder {
                reference: first_text(order, &["/orderReference", "/orderId"]),
                amount: order.pointer("/amount").and_then(parse_amount),
                payment_method: text_at(order, "/paymentMethod"),
                callback_url: text_at(order, "/callbackUrl"),
            }),
            alias_account_reference: text_at(payload, "/data/aliasAccountReference"),
            content_hash: content_hash(payload),
        }
    }

    pub fn order_reference(&self) -> Option<&str> {
        self.order
            .as_ref()
            .and_then(|order| order.reference.as_deref())
            .map(str::trim)
    }

    /// Trimmed transaction id, for use as a ledger reference.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction.id.as_deref().map(str::trim)
    }
}

/// Renders a scalar as text. Strings are kept exactly as sent because they feed
/// the signature; blank strings, objects, arrays and null are absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn text_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(scalar_text)
}

fn first_text(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| text_at(value, pointer))
}

/// serde_json maps keep keys sorted, so serializing the parsed value gives the
/// same bytes for the same content regardless of the sender's key order.
fn content_hash(payload: &Value) -> String {
    let canonical = serde_json::to_vec(payload).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}
