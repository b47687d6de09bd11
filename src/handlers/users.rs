use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, patch},
    Router,
};

use crate::auth::AuthUser;
use crate::entities::user::Preferences;
use crate::errors::ServiceError;
use crate::handlers::common::{message_response, success_response, MessageResponse};
use crate::handlers::AppState;
use crate::services::users::{
    AddressRequest, ChangePasswordRequest, PreferencesView, ProfileView, UpdateProfileRequest,
};

/// Self-service profile endpoints; mounted behind authentication
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/me/address", patch(update_address))
        .route("/me/password", patch(change_password))
        .route("/me/preferences", patch(update_preferences))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Caller's profile", body = ProfileView),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Account no longer exists", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.services.users.profile(auth_user.user_id).await?;
    Ok(success_response(profile))
}

#[utoipa::path(
    patch,
    path = "/api/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileView),
        (status = 400, description = "E-mail invalid or already in use", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state
        .services
        .users
        .update_profile(auth_user.user_id, payload)
        .await?;
    Ok(success_response(profile))
}

#[utoipa::path(
    patch,
    path = "/api/users/me/address",
    tag = "users",
    request_body = AddressRequest,
    responses(
        (status = 200, description = "Address replaced", body = AddressRequest),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_address(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<AddressRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let address = state
        .services
        .users
        .update_address(auth_user.user_id, payload)
        .await?;
    Ok(success_response(address))
}

#[utoipa::path(
    patch,
    path = "/api/users/me/password",
    tag = "users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Missing fields or new password too short", body = crate::errors::ErrorResponse),
        (status = 401, description = "Current password is wrong", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .users
        .change_password(auth_user.user_id, payload)
        .await?;
    Ok(message_response("Senha alterada com sucesso!"))
}

#[utoipa::path(
    patch,
    path = "/api/users/me/preferences",
    tag = "users",
    request_body = Preferences,
    responses(
        (status = 200, description = "Preferences saved", body = PreferencesView),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_preferences(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<Preferences>,
) -> Result<impl IntoResponse, ServiceError> {
    let saved = state
        .services
        .users
        .update_preferences(auth_user.user_id, payload)
        .await?;
    Ok(success_response(saved))
}

/// Removes the account and its order history
#[utoipa::path(
    delete,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.users.delete_account(auth_user.user_id).await?;
    Ok(message_response("Conta excluída com sucesso."))
}
