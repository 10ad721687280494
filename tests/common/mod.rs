#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bookbazaar_orderservice::{
    api::{Capture, GatewayError, GatewayResult, PaymentGateway, RemoteOrder, razorpay::sign_payment},
    cart::{CartStore, SessionId},
    checkout::{Checkout, PaymentCallback},
    ledger::{InMemoryOrderLedger, LedgerError, LedgerResult, OrderLedger},
    order::{NewOrder, Order, OrderStatus},
};

pub const KEY_SECRET: &str = "test_secret";
pub const KEY_ID: &str = "rzp_test_key";

#[derive(Default)]
struct FakeState {
    next_id: u32,
    remote_orders: HashMap<String, RemoteOrder>,
    create_failure: Option<GatewayError>,
    capture_failure: Option<GatewayError>,
    fetched_amount: Option<i64>,
    created: Vec<i64>,
    captures: Vec<(String, i64)>,
    verify_calls: usize,
}

/// In-process gateway that records every call and signs like the real one.
#[derive(Default, Clone)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create_with(&self, err: GatewayError) {
        self.state.lock().unwrap().create_failure = Some(err);
    }

    pub fn fail_capture_with(&self, err: GatewayError) {
        self.state.lock().unwrap().capture_failure = Some(err);
    }

    /// Makes `fetch_remote_order` report this amount regardless of what was created.
    pub fn report_amount(&self, amount: i64) {
        self.state.lock().unwrap().fetched_amount = Some(amount);
    }

    pub fn created(&self) -> Vec<i64> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn captures(&self) -> Vec<(String, i64)> {
        self.state.lock().unwrap().captures.clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.state.lock().unwrap().verify_calls
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn public_key_id(&self) -> &str {
        KEY_ID
    }

    async fn create_remote_order(
        &self,
        amount: i64,
        currency: &str,
        _receipt: &str,
    ) -> GatewayResult<RemoteOrder> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.create_failure.clone() {
            return Err(err);
        }

        state.next_id += 1;
        let order = RemoteOrder {
            id: format!("order_{}", state.next_id),
            amount,
            currency: currency.to_string(),
            status: "created".into(),
        };
        state.created.push(amount);
        state.remote_orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn verify_signature(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
        signature: &str,
    ) -> GatewayResult<bool> {
        self.state.lock().unwrap().verify_calls += 1;
        Ok(sign_payment(KEY_SECRET, gateway_order_ref, gateway_payment_ref) == signature)
    }

    async fn fetch_remote_order(&self, gateway_order_ref: &str) -> GatewayResult<RemoteOrder> {
        let state = self.state.lock().unwrap();
        let mut order = state
            .remote_orders
            .get(gateway_order_ref)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("unknown order {gateway_order_ref}")))?;
        if let Some(amount) = state.fetched_amount {
            order.amount = amount;
        }
        Ok(order)
    }

    async fn capture_funds(
        &self,
        gateway_payment_ref: &str,
        amount: i64,
        _currency: &str,
    ) -> GatewayResult<Capture> {
        let mut state = self.state.lock().unwrap();
        state.captures.push((gateway_payment_ref.to_string(), amount));
        if let Some(err) = state.capture_failure.clone() {
            return Err(err);
        }

        Ok(Capture {
            capture_ref: gateway_payment_ref.to_string(),
            amount,
            status: "captured".into(),
        })
    }
}

/// Ledger that stores everything but can never mark an order paid.
#[derive(Default, Clone)]
pub struct UnrecordedLedger {
    pub inner: InMemoryOrderLedger,
}

#[async_trait]
impl OrderLedger for UnrecordedLedger {
    async fn create_order(&self, order: NewOrder) -> LedgerResult<Order> {
        self.inner.create_order(order).await
    }

    async fn get_order(&self, id: i32) -> LedgerResult<Order> {
        self.inner.get_order(id).await
    }

    async fn update_status(&self, id: i32, status: OrderStatus) -> LedgerResult<Order> {
        self.inner.update_status(id, status).await
    }

    async fn attach_gateway_references(
        &self,
        id: i32,
        gateway_order_ref: &str,
        gateway_payment_ref: Option<&str>,
    ) -> LedgerResult<Order> {
        self.inner
            .attach_gateway_references(id, gateway_order_ref, gateway_payment_ref)
            .await
    }

    async fn record_payment(&self, _id: i32, _: &str, _: &str) -> LedgerResult<Order> {
        Err(LedgerError::Storage(anyhow::anyhow!("connection reset by peer")))
    }
}

pub struct Harness {
    pub checkout: Checkout,
    pub carts: CartStore,
    pub ledger: InMemoryOrderLedger,
    pub gateway: FakeGateway,
}

pub fn harness() -> Harness {
    let carts = CartStore::new();
    let ledger = InMemoryOrderLedger::new();
    let gateway = FakeGateway::new();
    let checkout = Checkout::new(
        carts.clone(),
        Arc::new(ledger.clone()),
        Arc::new(gateway.clone()),
        "INR",
    );

    Harness {
        checkout,
        carts,
        ledger,
        gateway,
    }
}

/// The two-book cart used throughout the checkout scenarios (total 130000).
pub async fn fill_cart(carts: &CartStore, session: &SessionId) {
    carts.add(session, "book-a", 2, 50_000, "Book A").await.unwrap();
    carts.add(session, "book-b", 1, 30_000, "Book B").await.unwrap();
}

/// A correctly signed payment callback.
pub fn signed_callback(order_id: i32, gateway_order_ref: &str, payment_ref: &str) -> PaymentCallback {
    PaymentCallback {
        order_id: Some(order_id.to_string()),
        gateway_order_ref: Some(gateway_order_ref.to_string()),
        gateway_payment_ref: Some(payment_ref.to_string()),
        signature: Some(sign_payment(KEY_SECRET, gateway_order_ref, payment_ref)),
    }
}
