use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::handlers::AppState;
use crate::services::shipping::{ShippingQuote, ShippingQuoteRequest};

pub fn shipping_routes() -> Router<AppState> {
    Router::new().route("/calculate", post(calculate_shipping))
}

/// Quote delivery options for a cart
#[utoipa::path(
    post,
    path = "/api/shipping/calculate",
    tag = "shipping",
    request_body = ShippingQuoteRequest,
    responses(
        (status = 200, description = "Available delivery options", body = [ShippingQuote]),
        (status = 400, description = "Invalid postal code or empty cart", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown book", body = crate::errors::ErrorResponse),
        (status = 500, description = "Shipping quotes unavailable", body = crate::errors::ErrorResponse),
    )
)]
pub async fn calculate_shipping(
    State(state): State<AppState>,
    Json(payload): Json<ShippingQuoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let quotes = state.services.shipping.calculate(payload).await?;
    Ok(success_response(quotes))
}
