use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response};
use crate::handlers::AppState;
use crate::services::accounts::{AuthResponse, GoogleLoginRequest, LoginRequest, RegisterRequest};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/google", post(google_login))
}

/// Create a customer account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Missing fields, malformed or duplicate e-mail", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.accounts.register(payload).await?;
    Ok(created_response(response))
}

/// Sign in with e-mail and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.accounts.login(payload).await?;
    Ok(success_response(response))
}

/// Sign in with a Google ID token or access token
#[utoipa::path(
    post,
    path = "/api/auth/google",
    tag = "auth",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Missing or invalid Google token", body = crate::errors::ErrorResponse),
        (status = 401, description = "Token rejected by Google", body = crate::errors::ErrorResponse),
        (status = 500, description = "Google unavailable", body = crate::errors::ErrorResponse),
    )
)]
pub async fn google_login(
    State(state): State<AppState>,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.accounts.google_login(payload).await?;
    Ok(success_response(response))
}
