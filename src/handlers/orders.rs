use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Router,
};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::{parse_id, success_response};
use crate::handlers::AppState;
use crate::services::orders::{AdminOrderView, OrderView, UpdateOrderRequest};

const ORDER_NOT_FOUND: &str = "Pedido não encontrado";

/// The caller's own orders; mounted behind authentication
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_orders))
        .route("/:id", get(get_my_order))
}

/// Back-office order management; mounted behind the admin role
pub fn admin_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_orders))
        .route("/:id", patch(update_order))
}

/// Orders placed by the caller, newest first
#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "orders",
    responses(
        (status = 200, description = "Caller's orders", body = [OrderView]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_for_user(auth_user.user_id).await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "orders",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = OrderView),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "No such order for this caller", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_my_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, ORDER_NOT_FOUND)?;
    let order = state
        .services
        .orders
        .get_for_user(auth_user.user_id, id)
        .await?;
    Ok(success_response(order))
}

/// Every order with its customer, newest first
#[utoipa::path(
    get,
    path = "/api/admin/orders",
    tag = "admin",
    responses(
        (status = 200, description = "All orders", body = [AdminOrderView]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_all_orders(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_all().await?;
    Ok(success_response(orders))
}

/// Change status or tracking code; `trackingCode: null` clears it
#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderView),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Status transition not allowed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, ORDER_NOT_FOUND)?;
    let order = state.services.orders.update_order(id, payload).await?;
    Ok(success_response(order))
}
