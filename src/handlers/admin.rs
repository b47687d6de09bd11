use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Router,
};

use crate::auth::AuthRouterExt;
use crate::entities::user::UserRole;
use crate::errors::ServiceError;
use crate::handlers::common::{parse_id, success_response};
use crate::handlers::{books, orders, AppState};
use crate::services::admin::{AdminUserView, StoreStats, UpdateRoleRequest};

/// Everything under `/api/admin`; authentication runs before the role check
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/users", get(list_users))
        .route("/users/:id", patch(update_user_role))
        .nest("/orders", orders::admin_order_routes())
        .nest("/books", books::admin_book_routes())
        .with_role(UserRole::Admin)
        .with_auth()
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    responses(
        (status = 200, description = "Store counters", body = StoreStats),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let stats = state.services.admin.stats().await?;
    Ok(success_response(stats))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    responses(
        (status = 200, description = "All accounts, newest first", body = [AdminUserView]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let users = state.services.admin.list_users().await?;
    Ok(success_response(users))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = AdminUserView),
        (status = 400, description = "Role must be ADMIN or CUSTOMER", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Usuário não encontrado.")?;
    let user = state.services.admin.update_role(id, payload).await?;
    Ok(success_response(user))
}
