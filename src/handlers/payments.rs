use axum::{
    body::Bytes,
    extract::{Json, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Router,
};

use crate::auth::{AuthRouterExt, AuthUser};
use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::handlers::AppState;
use crate::services::checkout::{CheckoutRequest, CheckoutResponse};
use crate::services::reconciler::WebhookAck;
use crate::webhooks::SIGNATURE_HEADER;

/// `create-intent` requires a signed-in caller; the webhook authenticates by signature
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .merge(Router::new().route("/create-intent", post(create_intent)).with_auth())
        .route("/webhook", post(stripe_webhook))
}

/// Open a pending order and a card payment intent for the cart
#[utoipa::path(
    post,
    path = "/api/stripe/create-intent",
    tag = "payments",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Intent created", body = CheckoutResponse),
        (status = 400, description = "Invalid cart, shipping option or address", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown book", body = crate::errors::ErrorResponse),
        (status = 409, description = "Not enough stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Payment processor failure", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_intent(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state
        .services
        .checkout
        .create_order_and_intent(auth_user.user_id, payload)
        .await?;
    Ok(success_response(response))
}

/// Processor notifications; the signature covers the raw body, so it is read as bytes
#[utoipa::path(
    post,
    path = "/api/stripe/webhook",
    tag = "payments",
    request_body(content = String, content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Missing or invalid signature", body = crate::errors::ErrorResponse),
    )
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    state.services.reconciler.handle(signature, &body).await?;
    Ok(success_response(WebhookAck::received()))
}
