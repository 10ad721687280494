//! Checkout orchestration: turns a session's cart into an order and drives the
//! order through the payment lifecycle against the gateway.
//!
//! ```text
//! pending ──► paid        (signature verified, funds captured)
//!    │
//!    └──────► cancelled   (remote order could not be created)
//! ```
//!
//! The amount captured always comes from the gateway's own record of the
//! remote order. The local total is kept for reconciliation only.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::{
    api::{GatewayError, PaymentGatewayRef},
    cart::{CartLine, CartStore, SessionId},
    ledger::{LedgerError, OrderLedgerRef},
    money,
    order::{ContactInfo, NewOrder, Order, OrderStatus},
};

const ORDER_LOCK_STRIPES: usize = 64;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Order #{0} not found")]
    OrderNotFound(i32),
    #[error("Missing payment parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),
    #[error("Payment signature verification failed")]
    SignatureInvalid,
    #[error("Order #{order_id} is not linked to gateway order {gateway_order_ref}")]
    OrderMismatch {
        order_id: i32,
        gateway_order_ref: String,
    },
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),
    #[error("Capturing payment for order #{order_id} failed: {reason}")]
    CaptureFailed { order_id: i32, reason: String },
    #[error("Payment for order #{order_id} was captured but not recorded: {reason}")]
    PaymentNotRecorded { order_id: i32, reason: String },
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error(transparent)]
    Storage(anyhow::Error),
}

impl From<GatewayError> for CheckoutError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(reason) => CheckoutError::GatewayUnavailable(reason),
            GatewayError::Rejected(reason) => CheckoutError::GatewayRejected(reason),
        }
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::OrderNotFound(id) => CheckoutError::OrderNotFound(id),
            LedgerError::InvalidTransition { from, to } => {
                CheckoutError::InvalidTransition { from, to }
            }
            LedgerError::NoItems => CheckoutError::EmptyCart,
            LedgerError::Storage(err) => CheckoutError::Storage(err),
        }
    }
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// What the client needs to open the gateway's payment widget.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutHandle {
    pub order: Order,
    pub gateway_order_ref: String,
    /// Amount in minor currency units.
    pub amount: i64,
    pub amount_display: String,
    pub currency: String,
    pub key_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutSummary {
    pub lines: Vec<CartLine>,
    pub total: i64,
    pub total_display: String,
    pub currency: String,
}

/// Payment-completion callback as posted by the gateway's client widget.
///
/// Every field is optional on the wire so that missing values can be reported
/// together instead of failing at deserialization.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PaymentCallback {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default, rename = "razorpay_order_id", alias = "gateway_order_ref")]
    pub gateway_order_ref: Option<String>,
    #[serde(default, rename = "razorpay_payment_id", alias = "gateway_payment_ref")]
    pub gateway_payment_ref: Option<String>,
    #[serde(default, rename = "razorpay_signature", alias = "signature")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PaymentConfirmation {
    order_id: i32,
    gateway_order_ref: String,
    gateway_payment_ref: String,
    signature: String,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PaymentCallback {
    /// Checks that every parameter is present. An `order_id` that is not a
    /// number counts as missing.
    fn confirm(&self) -> CheckoutResult<PaymentConfirmation> {
        let order_id = present(&self.order_id).and_then(|id| id.parse::<i32>().ok());
        let gateway_order_ref = present(&self.gateway_order_ref);
        let gateway_payment_ref = present(&self.gateway_payment_ref);
        let signature = present(&self.signature);

        match (order_id, gateway_order_ref, gateway_payment_ref, signature) {
            (Some(order_id), Some(gateway_order_ref), Some(gateway_payment_ref), Some(signature)) => {
                Ok(PaymentConfirmation {
                    order_id,
                    gateway_order_ref,
                    gateway_payment_ref,
                    signature,
                })
            }
            (order_id, gateway_order_ref, gateway_payment_ref, signature) => {
                let missing = [
                    ("order_id", order_id.is_none()),
                    ("razorpay_order_id", gateway_order_ref.is_none()),
                    ("razorpay_payment_id", gateway_payment_ref.is_none()),
                    ("razorpay_signature", signature.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, missing)| missing.then_some(name))
                .collect();
                Err(CheckoutError::MissingParameters(missing))
            }
        }
    }
}

/// Striped async locks serializing payment completion per order id.
struct OrderLocks {
    stripes: Vec<Mutex<()>>,
}

impl OrderLocks {
    fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    fn for_order(&self, order_id: i32) -> &Mutex<()> {
        let idx = order_id.unsigned_abs() as usize % self.stripes.len();
        &self.stripes[idx]
    }
}

#[derive(Clone)]
pub struct Checkout {
    carts: CartStore,
    ledger: OrderLedgerRef,
    gateway: PaymentGatewayRef,
    currency: String,
    order_locks: Arc<OrderLocks>,
}

impl Checkout {
    pub fn new(
        carts: CartStore,
        ledger: OrderLedgerRef,
        gateway: PaymentGatewayRef,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            carts,
            ledger,
            gateway,
            currency: currency.into(),
            order_locks: Arc::new(OrderLocks::new(ORDER_LOCK_STRIPES)),
        }
    }

    pub fn carts(&self) -> &CartStore {
        &self.carts
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub async fn checkout_summary(&self, session: &SessionId) -> CheckoutSummary {
        let snapshot = self.carts.snapshot(session).await;
        CheckoutSummary {
            total_display: money::to_major_units(snapshot.total),
            total: snapshot.total,
            lines: snapshot.lines,
            currency: self.currency.clone(),
        }
    }

    pub async fn order(&self, order_id: i32) -> CheckoutResult<Order> {
        Ok(self.ledger.get_order(order_id).await?)
    }

    /// Creates a pending order from the session's cart and a matching remote
    /// order at the gateway.
    ///
    /// If the gateway refuses or cannot be reached the order is cancelled
    /// before the error is returned. The cart is left untouched either way.
    pub async fn begin_checkout(
        &self,
        session: &SessionId,
        contact: ContactInfo,
        user_id: Option<i32>,
    ) -> CheckoutResult<CheckoutHandle> {
        let snapshot = self.carts.snapshot(session).await;
        if snapshot.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let new_order = NewOrder::from_snapshot(&snapshot, contact, user_id, self.currency.as_str());
        let order = self.ledger.create_order(new_order).await?;
        info!(
            order_id = order.id,
            total = order.total,
            items = order.items.len(),
            "Order created, awaiting payment"
        );

        let remote = match self
            .gateway
            .create_remote_order(order.total, &order.currency, &receipt(order.id))
            .await
        {
            Ok(remote) => remote,
            Err(err) => {
                self.cancel(order.id, &err.to_string()).await;
                return Err(err.into());
            }
        };

        let order = match self
            .ledger
            .attach_gateway_references(order.id, &remote.id, None)
            .await
        {
            Ok(order) => order,
            Err(err) => {
                self.cancel(order.id, &err.to_string()).await;
                return Err(err.into());
            }
        };

        info!(
            order_id = order.id,
            gateway_order_ref = %remote.id,
            amount = remote.amount,
            "Remote payment order created"
        );

        Ok(CheckoutHandle {
            amount_display: money::to_major_units(remote.amount),
            amount: remote.amount,
            currency: remote.currency,
            gateway_order_ref: remote.id,
            key_id: self.gateway.public_key_id().to_string(),
            order,
        })
    }

    /// Verifies a payment callback, captures the gateway-authorized amount and
    /// marks the order paid. On success the session's cart is cleared.
    ///
    /// A failed capture leaves the order `pending` with the payment reference
    /// attached; funds may have moved, so it is never rolled back here. The
    /// same holds when funds were captured but the order cannot be marked paid.
    pub async fn complete_payment(
        &self,
        session: &SessionId,
        callback: &PaymentCallback,
    ) -> CheckoutResult<Order> {
        let confirmation = callback.confirm()?;
        let order_id = confirmation.order_id;

        let _guard = self.order_locks.for_order(order_id).lock().await;

        let order = self.ledger.get_order(order_id).await?;
        if order.gateway_order_ref.as_deref() != Some(confirmation.gateway_order_ref.as_str()) {
            warn!(
                target: "security",
                order_id,
                gateway_order_ref = %confirmation.gateway_order_ref,
                "Payment callback references a different gateway order"
            );
            return Err(CheckoutError::OrderMismatch {
                order_id,
                gateway_order_ref: confirmation.gateway_order_ref,
            });
        }

        let verified = self
            .gateway
            .verify_signature(
                &confirmation.gateway_order_ref,
                &confirmation.gateway_payment_ref,
                &confirmation.signature,
            )
            .await?;
        if !verified {
            warn!(
                target: "security",
                order_id,
                gateway_order_ref = %confirmation.gateway_order_ref,
                gateway_payment_ref = %confirmation.gateway_payment_ref,
                "Payment signature verification failed"
            );
            return Err(CheckoutError::SignatureInvalid);
        }

        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Paid
                if order.gateway_payment_ref.as_deref()
                    == Some(confirmation.gateway_payment_ref.as_str()) =>
            {
                info!(order_id, "Payment callback replayed for a paid order");
                self.carts.clear(session).await;
                return Ok(order);
            }
            status => {
                return Err(CheckoutError::InvalidTransition {
                    from: status,
                    to: OrderStatus::Paid,
                });
            }
        }

        let remote = self
            .gateway
            .fetch_remote_order(&confirmation.gateway_order_ref)
            .await?;
        let amount = remote.amount;
        if amount <= 0 {
            return Err(CheckoutError::GatewayRejected(format!(
                "gateway order {} has nothing to capture",
                remote.id
            )));
        }

        if amount != order.total {
            warn!(
                target: "reconciliation",
                order_id,
                local_total = order.total,
                gateway_amount = amount,
                "Local total differs from gateway amount; capturing gateway amount"
            );
        }

        let capture = match self
            .gateway
            .capture_funds(&confirmation.gateway_payment_ref, amount, &remote.currency)
            .await
        {
            Ok(capture) => capture,
            Err(err) => {
                error!(
                    order_id,
                    gateway_payment_ref = %confirmation.gateway_payment_ref,
                    amount,
                    error = %err,
                    "Capture failed; order left pending for manual reconciliation"
                );
                if let Err(attach_err) = self
                    .ledger
                    .attach_gateway_references(
                        order_id,
                        &confirmation.gateway_order_ref,
                        Some(&confirmation.gateway_payment_ref),
                    )
                    .await
                {
                    error!(order_id, error = %attach_err, "Failed to record payment reference");
                }
                return Err(CheckoutError::CaptureFailed {
                    order_id,
                    reason: err.to_string(),
                });
            }
        };

        let order = match self
            .ledger
            .record_payment(
                order_id,
                &confirmation.gateway_order_ref,
                &confirmation.gateway_payment_ref,
            )
            .await
        {
            Ok(order) => order,
            Err(err) => {
                error!(
                    target: "reconciliation",
                    order_id,
                    capture_ref = %capture.capture_ref,
                    captured = capture.amount,
                    error = %err,
                    "Funds captured but order could not be marked paid"
                );
                return Err(CheckoutError::PaymentNotRecorded {
                    order_id,
                    reason: err.to_string(),
                });
            }
        };

        info!(
            target: "reconciliation",
            order_id,
            local_total = order.total,
            gateway_amount = amount,
            captured = capture.amount,
            capture_ref = %capture.capture_ref,
            "Payment captured"
        );

        self.carts.clear(session).await;
        Ok(order)
    }

    async fn cancel(&self, order_id: i32, reason: &str) {
        match self
            .ledger
            .update_status(order_id, OrderStatus::Cancelled)
            .await
        {
            Ok(_) => warn!(order_id, %reason, "Order cancelled"),
            Err(err) => error!(
                order_id,
                %reason,
                error = %err,
                "Failed to cancel order; it needs manual review"
            ),
        }
    }
}

/// Receipt reference sent to the gateway for a local order.
fn receipt(order_id: i32) -> String {
    format!("order_rcptid_{order_id}")
}
