use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    cart::{CartSnapshot, SessionId},
    middleware,
};

/// Defines the session-scoped cart routes.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_cart, clear_cart))
        .routes(utoipa_axum::routes!(add_cart_item))
        .routes(utoipa_axum::routes!(update_cart_item, remove_cart_item))
        .route_layer(axum::middleware::from_fn(middleware::session))
}

/// Fetch the current session's cart.
#[utoipa::path(
    get,
    path = "/cart",
    tags = ["Cart"],
    responses(
        (status = 200, description = "Get cart successfully", body = CartSnapshot)
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> impl IntoResponse {
    StdResponse {
        data: Some(state.checkout.carts().snapshot(&session).await),
        message: Some("Get cart successfully"),
    }
}

#[derive(Deserialize, ToSchema)]
struct AddCartItemReq {
    product_id: String,
    #[serde(default = "default_quantity")]
    quantity: i32,
    /// Unit price in minor currency units.
    unit_price: i64,
    #[serde(default)]
    title: String,
}

fn default_quantity() -> i32 {
    1
}

/// Add a book to the cart, merging with an existing line.
#[utoipa::path(
    post,
    path = "/cart/items",
    tags = ["Cart"],
    request_body = AddCartItemReq,
    responses(
        (status = 200, description = "Added item successfully", body = CartSnapshot),
        (status = 400, description = "Invalid item or cart total out of range")
    )
)]
async fn add_cart_item(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Json(body): Json<AddCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let product_id = body.product_id.trim();
    if product_id.is_empty() {
        return Err(AppError::BadRequest("product_id must not be empty".into()));
    }

    let cart = state
        .checkout
        .carts()
        .add(&session, product_id, body.quantity, body.unit_price, body.title.trim())
        .await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Added item successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateCartItemReq {
    quantity: i32,
}

/// Set the quantity of a cart line. Zero or less removes it.
#[utoipa::path(
    patch,
    path = "/cart/items/{product_id}",
    tags = ["Cart"],
    params(
        ("product_id" = String, Path, description = "Product to update")
    ),
    request_body = UpdateCartItemReq,
    responses(
        (status = 200, description = "Updated cart successfully", body = CartSnapshot),
        (status = 400, description = "Cart total out of range")
    )
)]
async fn update_cart_item(
    Path(product_id): Path<String>,
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let cart = state
        .checkout
        .carts()
        .update(&session, product_id.trim(), body.quantity)
        .await?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Updated cart successfully"),
    })
}

/// Remove a cart line. Removing an absent product is not an error.
#[utoipa::path(
    delete,
    path = "/cart/items/{product_id}",
    tags = ["Cart"],
    params(
        ("product_id" = String, Path, description = "Product to remove")
    ),
    responses(
        (status = 200, description = "Removed item successfully", body = CartSnapshot)
    )
)]
async fn remove_cart_item(
    Path(product_id): Path<String>,
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> impl IntoResponse {
    let cart = state
        .checkout
        .carts()
        .remove(&session, product_id.trim())
        .await;

    StdResponse {
        data: Some(cart),
        message: Some("Removed item successfully"),
    }
}

/// Empty the cart.
#[utoipa::path(
    delete,
    path = "/cart",
    tags = ["Cart"],
    responses(
        (status = 200, description = "Cleared cart successfully", body = CartSnapshot)
    )
)]
async fn clear_cart(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> impl IntoResponse {
    state.checkout.carts().clear(&session).await;

    StdResponse {
        data: Some(CartSnapshot::default()),
        message: Some("Cleared cart successfully"),
    }
}
