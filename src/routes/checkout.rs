use axum::{
    Extension, Form, Json,
    extract::State,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    cart::SessionId,
    checkout::{CheckoutHandle, CheckoutSummary, PaymentCallback},
    middleware,
    order::ContactInfo,
};

/// Defines the checkout routes. Both are bound to the shopper's session.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_checkout, begin_checkout))
        .routes(utoipa_axum::routes!(verify_payment))
        .route_layer(axum::middleware::from_fn(middleware::session))
}

/// Summarise the cart about to be checked out.
#[utoipa::path(
    get,
    path = "/checkout",
    tags = ["Checkout"],
    responses(
        (status = 200, description = "Get checkout summary successfully", body = CheckoutSummary)
    )
)]
async fn get_checkout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> impl IntoResponse {
    StdResponse {
        data: Some(state.checkout.checkout_summary(&session).await),
        message: Some("Get checkout summary successfully"),
    }
}

#[derive(Deserialize, ToSchema)]
struct BeginCheckoutReq {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

/// Place a pending order for the cart and open a payment with the gateway.
#[utoipa::path(
    post,
    path = "/checkout",
    tags = ["Checkout"],
    request_body = BeginCheckoutReq,
    responses(
        (status = 200, description = "Created payment session successfully", body = CheckoutHandle),
        (status = 400, description = "Cart is empty"),
        (status = 502, description = "Gateway declined the payment order"),
        (status = 503, description = "Gateway unreachable")
    )
)]
async fn begin_checkout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Json(body): Json<BeginCheckoutReq>,
) -> Result<impl IntoResponse, AppError> {
    let contact = ContactInfo::new(body.full_name, body.email, body.address);
    let handle = state
        .checkout
        .begin_checkout(&session, contact, None)
        .await?;

    Ok(StdResponse {
        data: Some(handle),
        message: Some("Created payment session successfully"),
    })
}

/// Payment-completion callback posted after the shopper pays.
///
/// Redirects to the order confirmation on success.
#[utoipa::path(
    post,
    path = "/checkout/verify",
    tags = ["Checkout"],
    request_body(content = PaymentCallback, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Payment captured, redirect to order confirmation"),
        (status = 400, description = "Missing parameters or invalid signature"),
        (status = 502, description = "Capture failed, order stays pending")
    )
)]
async fn verify_payment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Form(callback): Form<PaymentCallback>,
) -> Result<Redirect, AppError> {
    let order = state.checkout.complete_payment(&session, &callback).await?;
    info!(order_id = order.id, "Order paid");

    Ok(Redirect::to(&format!("/orders/{}/success", order.id)))
}
