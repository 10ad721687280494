use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use crate::{cart::CartError, checkout::CheckoutError};

/// JSON envelope shared by every endpoint.
#[derive(Serialize, Debug)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, String, Option<Value>) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), None),
            AppError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone(), None),
            AppError::Cart(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            AppError::Checkout(err) => checkout_parts(err),
            AppError::Other(_) => internal(),
        }
    }
}

fn internal() -> (StatusCode, String, Option<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong on our side. Please try again.".into(),
        None,
    )
}

fn checkout_parts(err: &CheckoutError) -> (StatusCode, String, Option<Value>) {
    match err {
        CheckoutError::EmptyCart => (
            StatusCode::BAD_REQUEST,
            "Your cart is empty. Add a book before checking out.".into(),
            None,
        ),
        CheckoutError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string(), None),
        CheckoutError::MissingParameters(_) | CheckoutError::OrderMismatch { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string(), None)
        }
        CheckoutError::SignatureInvalid => (
            StatusCode::BAD_REQUEST,
            "We could not verify this payment. You have not been charged.".into(),
            None,
        ),
        CheckoutError::GatewayUnavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "The payment service is unreachable right now. Please try again.".into(),
            None,
        ),
        CheckoutError::GatewayRejected(reason) => (
            StatusCode::BAD_GATEWAY,
            format!("The payment provider declined the request: {reason}"),
            None,
        ),
        CheckoutError::CaptureFailed { order_id, .. }
        | CheckoutError::PaymentNotRecorded { order_id, .. } => (
            StatusCode::BAD_GATEWAY,
            format!(
                "Your payment for order #{order_id} is still pending confirmation. \
                 Please contact support before paying again."
            ),
            Some(json!({ "order_id": order_id, "status": "pending" })),
        ),
        CheckoutError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string(), None),
        CheckoutError::Storage(_) => internal(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, data) = self.parts();
        if status.is_server_error() {
            error!(%status, error = %self, "Request failed");
        }

        (status, StdResponse { data, message: Some(message) }).into_response()
    }
}
