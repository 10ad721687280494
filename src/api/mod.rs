//! Outbound clients. The only remote dependency is the payment gateway.

pub mod razorpay;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use razorpay::RazorpayGateway;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, timeout or a server-side error. Safe to retry by hand.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
    /// The gateway understood the request and declined it.
    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// A payment intent as the gateway sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    /// Amount in minor currency units agreed with the gateway.
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub capture_ref: String,
    pub amount: i64,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Publishable key id handed to the client-side payment widget.
    fn public_key_id(&self) -> &str;

    async fn create_remote_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> GatewayResult<RemoteOrder>;

    /// Checks a payment callback signature. A mismatch is `Ok(false)`, never an error.
    async fn verify_signature(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
        signature: &str,
    ) -> GatewayResult<bool>;

    async fn fetch_remote_order(&self, gateway_order_ref: &str) -> GatewayResult<RemoteOrder>;

    async fn capture_funds(
        &self,
        gateway_payment_ref: &str,
        amount: i64,
        currency: &str,
    ) -> GatewayResult<Capture>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
