use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::entities::book;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, parse_id, success_response};
use crate::handlers::AppState;
use crate::services::catalog::{BookListQuery, BookPage, CreateBookRequest, UpdateBookRequest};

const BOOK_NOT_FOUND: &str = "Livro não encontrado";

/// Public catalog
pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_books))
        .route("/:id", get(get_book))
}

/// Catalog maintenance, mounted under the admin router
pub fn admin_book_routes() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(create_book))
        .route("/:id", axum::routing::put(update_book).delete(delete_book))
}

/// Browse the catalog
#[utoipa::path(
    get,
    path = "/api/books",
    tag = "books",
    params(BookListQuery),
    responses(
        (status = 200, description = "One page of books (20 per page)", body = BookPage),
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state.services.catalog.list_books(query).await?;
    Ok(success_response(page))
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    tag = "books",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book", body = book::Model),
        (status = 404, description = "Book not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, BOOK_NOT_FOUND)?;
    let book = state.services.catalog.get_book(id).await?;
    Ok(success_response(book))
}

#[utoipa::path(
    post,
    path = "/api/admin/books",
    tag = "admin",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Book created", body = book::Model),
        (status = 400, description = "Invalid book", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_book(
    State(state): State<AppState>,
    Json(payload): Json<CreateBookRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let book = state.services.catalog.create_book(payload).await?;
    Ok(created_response(book))
}

/// Partial update; absent fields keep their value
#[utoipa::path(
    put,
    path = "/api/admin/books/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Book id")),
    request_body = UpdateBookRequest,
    responses(
        (status = 200, description = "Book updated", body = book::Model),
        (status = 400, description = "Invalid book", body = crate::errors::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateBookRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, BOOK_NOT_FOUND)?;
    let book = state.services.catalog.update_book(id, payload).await?;
    Ok(success_response(book))
}

/// Existing order lines keep their price and lose the book reference
#[utoipa::path(
    delete,
    path = "/api/admin/books/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, BOOK_NOT_FOUND)?;
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
