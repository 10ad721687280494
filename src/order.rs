use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::cart::CartSnapshot;

/// Placeholder stored for contact fields the shopper left blank.
pub const NOT_AVAILABLE: &str = "N/A";

/// Lifecycle of an order. `Paid` and `Cancelled` are terminal within checkout.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    /// Whether the checkout state machine allows moving from `self` to `next`.
    ///
    /// Re-applying the current status is always allowed and treated as a no-op
    /// by the ledgers.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        self == next || matches!((self, next), (Pending, Paid) | (Pending, Cancelled))
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }
}

/// Contact details captured at checkout. Blank fields collapse to [`NOT_AVAILABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContactInfo {
    pub full_name: String,
    pub email: String,
    pub address: String,
}

impl ContactInfo {
    pub fn new(
        full_name: Option<String>,
        email: Option<String>,
        address: Option<String>,
    ) -> Self {
        Self {
            full_name: or_not_available(full_name),
            email: or_not_available(email),
            address: or_not_available(address),
        }
    }
}

impl Default for ContactInfo {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

fn or_not_available(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub product_id: String,
    pub title: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i32,
    pub user_id: Option<i32>,
    pub contact: ContactInfo,
    pub status: OrderStatus,
    /// Total in minor currency units, fixed when the order is created.
    pub total: i64,
    pub currency: String,
    pub gateway_order_ref: Option<String>,
    pub gateway_payment_ref: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn items_total(&self) -> i64 {
        self.items.iter().map(|item| item.subtotal).sum()
    }
}

/// A line item that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: String,
    pub title: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

/// Everything the ledger needs to create an order and its items in one unit.
///
/// Only built from a cart snapshot, whose subtotals and total are already
/// bounded, so the order total always equals the sum of its item subtotals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: Option<i32>,
    pub contact: ContactInfo,
    pub currency: String,
    items: Vec<NewOrderItem>,
    total: i64,
}

impl NewOrder {
    pub fn from_snapshot(
        snapshot: &CartSnapshot,
        contact: ContactInfo,
        user_id: Option<i32>,
        currency: impl Into<String>,
    ) -> Self {
        let items = snapshot
            .lines
            .iter()
            .map(|line| NewOrderItem {
                product_id: line.product_id.clone(),
                title: line.title.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                subtotal: line.subtotal,
            })
            .collect();

        Self {
            user_id,
            contact,
            currency: currency.into(),
            items,
            total: snapshot.total,
        }
    }

    pub fn items(&self) -> &[NewOrderItem] {
        &self.items
    }

    pub fn total(&self) -> i64 {
        self.total
    }
}
