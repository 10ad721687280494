use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{LedgerError, LedgerResult, OrderLedger, check_transition};
use crate::order::{NewOrder, Order, OrderItem, OrderStatus};

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<i32, Order>,
    next_order_id: i32,
    next_item_id: i32,
}

/// A thread-safe in-memory order ledger.
///
/// All writes happen under a single write lock, which gives the same
/// all-or-nothing and per-order serialization guarantees as the Postgres
/// ledger. Suited to tests and local runs without a database.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOrderLedger {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn modify<F>(&self, id: i32, f: F) -> LedgerResult<Order>
    where
        F: FnOnce(&mut Order) -> LedgerResult<()> + Send,
    {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or(LedgerError::OrderNotFound(id))?;

        // Work on a copy so a failed check leaves the stored order untouched.
        let mut updated = order.clone();
        f(&mut updated)?;
        updated.updated_at = Utc::now();
        *order = updated.clone();

        Ok(updated)
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn create_order(&self, new_order: NewOrder) -> LedgerResult<Order> {
        if new_order.items().is_empty() {
            return Err(LedgerError::NoItems);
        }

        let mut tables = self.tables.write().await;
        tables.next_order_id += 1;
        let order_id = tables.next_order_id;

        let mut items = Vec::with_capacity(new_order.items().len());
        for item in new_order.items() {
            tables.next_item_id += 1;
            items.push(OrderItem {
                id: tables.next_item_id,
                order_id,
                product_id: item.product_id.clone(),
                title: item.title.clone(),
                unit_price: item.unit_price,
                quantity: item.quantity,
                subtotal: item.subtotal,
            });
        }

        let now = Utc::now();
        let total = new_order.total();
        let order = Order {
            id: order_id,
            user_id: new_order.user_id,
            contact: new_order.contact,
            status: OrderStatus::Pending,
            total,
            currency: new_order.currency,
            gateway_order_ref: None,
            gateway_payment_ref: None,
            items,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(order_id, order.clone());

        Ok(order)
    }

    async fn get_order(&self, id: i32) -> LedgerResult<Order> {
        let tables = self.tables.read().await;
        tables
            .orders
            .get(&id)
            .cloned()
            .ok_or(LedgerError::OrderNotFound(id))
    }

    async fn update_status(&self, id: i32, status: OrderStatus) -> LedgerResult<Order> {
        self.modify(id, |order| {
            if check_transition(order.status, status)? {
                order.status = status;
            }
            Ok(())
        })
        .await
    }

    async fn attach_gateway_references(
        &self,
        id: i32,
        gateway_order_ref: &str,
        gateway_payment_ref: Option<&str>,
    ) -> LedgerResult<Order> {
        self.modify(id, |order| {
            order.gateway_order_ref = Some(gateway_order_ref.to_string());
            if let Some(payment_ref) = gateway_payment_ref {
                order.gateway_payment_ref = Some(payment_ref.to_string());
            }
            Ok(())
        })
        .await
    }

    async fn record_payment(
        &self,
        id: i32,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
    ) -> LedgerResult<Order> {
        self.modify(id, |order| {
            if order.status != OrderStatus::Pending {
                return Err(LedgerError::InvalidTransition {
                    from: order.status,
                    to: OrderStatus::Paid,
                });
            }
            order.status = OrderStatus::Paid;
            order.gateway_order_ref = Some(gateway_order_ref.to_string());
            order.gateway_payment_ref = Some(gateway_payment_ref.to_string());
            Ok(())
        })
        .await
    }
}
