pub mod carts;
pub mod checkout;
pub mod orders;

use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;

/// Assembles every route, the OpenAPI document and the Swagger UI.
pub fn app(state: AppState) -> Router {
    let routes = carts::routes_with_openapi()
        .merge(checkout::routes_with_openapi())
        .merge(orders::routes_with_openapi());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("BookBazaar OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi);

    Router::new()
        .merge(routes)
        .merge(swagger_ui)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
