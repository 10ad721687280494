use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;
use tracing::{debug, warn};

use super::{Capture, GatewayError, GatewayResult, PaymentGateway, RemoteOrder};
use crate::config::GatewayConfig;

type HmacSha256 = Hmac<Sha256>;

/// Signs `"{order_ref}|{payment_ref}"` the way the gateway signs payment callbacks.
pub fn sign_payment(key_secret: &str, gateway_order_ref: &str, gateway_payment_ref: &str) -> String {
    hex::encode(payment_mac(key_secret, gateway_order_ref, gateway_payment_ref).finalize().into_bytes())
}

fn payment_mac(key_secret: &str, gateway_order_ref: &str, gateway_payment_ref: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"));
    mac.update(gateway_order_ref.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_ref.as_bytes());
    mac
}

#[derive(Serialize)]
struct CreateOrderReq<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    /// 0 = authorize only; funds are captured explicitly after verification.
    payment_capture: u8,
}

#[derive(Serialize)]
struct CaptureReq<'a> {
    amount: i64,
    currency: &'a str,
}

#[derive(Deserialize)]
struct OrderRes {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

impl From<OrderRes> for RemoteOrder {
    fn from(res: OrderRes) -> Self {
        Self {
            id: res.id,
            amount: res.amount,
            currency: res.currency,
            status: res.status,
        }
    }
}

#[derive(Deserialize)]
struct PaymentRes {
    id: String,
    amount: i64,
    status: String,
}

#[derive(Deserialize)]
struct ErrorRes {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// REST adapter for Razorpay-compatible payment gateways.
#[derive(Clone)]
pub struct RazorpayGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build payment gateway HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let res = request
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Unavailable("request timed out".into())
                } else {
                    GatewayError::Unavailable(err.to_string())
                }
            })?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<T>()
                .await
                .map_err(|err| GatewayError::Unavailable(format!("unreadable response: {err}")));
        }

        if status.is_client_error() {
            let reason = match res.json::<ErrorRes>().await {
                Ok(ErrorRes { error }) => match (error.code, error.description) {
                    (_, Some(description)) => description,
                    (Some(code), None) => code,
                    (None, None) => status.to_string(),
                },
                Err(_) => status.to_string(),
            };
            warn!(%status, %reason, "Payment gateway rejected request");
            return Err(GatewayError::Rejected(reason));
        }

        Err(GatewayError::Unavailable(format!(
            "gateway responded with {status}"
        )))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn public_key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_remote_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> GatewayResult<RemoteOrder> {
        if amount <= 0 {
            return Err(GatewayError::Rejected(format!("invalid amount {amount}")));
        }

        let order: OrderRes = self
            .send(self.client.post(self.url("/orders")).json(&CreateOrderReq {
                amount,
                currency,
                receipt,
                payment_capture: 0,
            }))
            .await?;

        debug!(gateway_order_ref = %order.id, amount, "Remote order created");
        Ok(order.into())
    }

    async fn verify_signature(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
        signature: &str,
    ) -> GatewayResult<bool> {
        let Ok(signature) = hex::decode(signature.trim()) else {
            return Ok(false);
        };

        Ok(payment_mac(&self.key_secret, gateway_order_ref, gateway_payment_ref)
            .verify_slice(&signature)
            .is_ok())
    }

    async fn fetch_remote_order(&self, gateway_order_ref: &str) -> GatewayResult<RemoteOrder> {
        let order: OrderRes = self
            .send(
                self.client
                    .get(self.url(&format!("/orders/{gateway_order_ref}"))),
            )
            .await?;
        Ok(order.into())
    }

    async fn capture_funds(
        &self,
        gateway_payment_ref: &str,
        amount: i64,
        currency: &str,
    ) -> GatewayResult<Capture> {
        let payment: PaymentRes = self
            .send(
                self.client
                    .post(self.url(&format!("/payments/{gateway_payment_ref}/capture")))
                    .json(&CaptureReq { amount, currency }),
            )
            .await?;

        Ok(Capture {
            capture_ref: payment.id,
            amount: payment.amount,
            status: payment.status,
        })
    }
}
