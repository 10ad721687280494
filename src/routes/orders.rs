use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    money,
    order::{Order, OrderStatus},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_order))
        .routes(utoipa_axum::routes!(order_success))
}

/// Fetch a specific order with its items.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = Order),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.checkout.order(id).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct OrderConfirmationRes {
    order: Order,
    total_display: String,
}

/// Order confirmation shown after checkout.
#[utoipa::path(
    get,
    path = "/orders/{id}/success",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to confirm")
    ),
    responses(
        (status = 200, description = "Order confirmation", body = OrderConfirmationRes),
        (status = 404, description = "Order not found")
    )
)]
async fn order_success(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.checkout.order(id).await?;
    let message = match order.status {
        OrderStatus::Paid | OrderStatus::Shipped => "Thank you! Your payment was received.",
        OrderStatus::Pending => {
            "Your payment is being confirmed. Contact support if this does not change soon."
        }
        OrderStatus::Cancelled => "This order was cancelled.",
    };

    Ok(StdResponse {
        data: Some(OrderConfirmationRes {
            total_display: money::to_major_units(order.total),
            order,
        }),
        message: Some(message),
    })
}
