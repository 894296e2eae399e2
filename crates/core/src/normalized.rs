//! Provider-agnostic projections of orders and payment transactions.
//!
//! Adapters build these from vendor JSON. They are never persisted as their
//! own entities: an order is stored through the order repository and a
//! transaction only lives long enough to route a webhook.

use serde::{Deserialize, Serialize};

use crate::provider::PosProvider;
use crate::types::Timestamp;

/// Payment status after mapping the vendor's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Pending => "PENDING",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub quantity: i64,
    /// Line total in minor currency units.
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedOrder {
    pub external_order_id: String,
    pub provider: PosProvider,
    /// Order total in minor currency units.
    pub total_amount: i64,
    /// ISO 4217 code, upper-case.
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub created_at: Option<Timestamp>,
    pub location_id: Option<String>,
    /// The vendor response the order was built from.
    pub raw_payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTransaction {
    pub external_transaction_id: String,
    pub external_order_id: String,
    pub provider: PosProvider,
    pub amount: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub location_id: Option<String>,
    pub merchant_id: Option<String>,
    pub created_at: Option<Timestamp>,
}
