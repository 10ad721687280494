pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::order::{NewOrder, Order, OrderStatus};

pub use in_memory::InMemoryOrderLedger;
pub use postgres::PgOrderLedger;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Order #{0} not found")]
    OrderNotFound(i32),
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order must contain at least one item")]
    NoItems,
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Durable record of orders and their line items.
///
/// Every write is atomic: an order is created together with all of its items
/// or not at all, and status transitions on one order never interleave.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Persists a `pending` order and its items in a single unit.
    async fn create_order(&self, order: NewOrder) -> LedgerResult<Order>;

    async fn get_order(&self, id: i32) -> LedgerResult<Order>;

    /// Moves an order to `status` if the state machine allows it.
    async fn update_status(&self, id: i32, status: OrderStatus) -> LedgerResult<Order>;

    async fn attach_gateway_references(
        &self,
        id: i32,
        gateway_order_ref: &str,
        gateway_payment_ref: Option<&str>,
    ) -> LedgerResult<Order>;

    /// Marks a `pending` order as `paid` and stores both gateway references.
    async fn record_payment(
        &self,
        id: i32,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
    ) -> LedgerResult<Order>;
}

pub type OrderLedgerRef = Arc<dyn OrderLedger>;

/// Checks the transition and reports whether a write is needed at all.
pub(crate) fn check_transition(current: OrderStatus, next: OrderStatus) -> LedgerResult<bool> {
    if !current.can_transition_to(next) {
        return Err(LedgerError::InvalidTransition {
            from: current,
            to: next,
        });
    }
    Ok(current != next)
}
