use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::db::DbPool;
use crate::entities::book::{self, ActiveModel as BookActiveModel, BookCondition};
use crate::errors::ServiceError;
use crate::repositories::book_repository::{BookFilter, BookRepository, BookSort, BOOKS_PAGE_SIZE};

pub const DEFAULT_WEIGHT_GRAMS: i32 = 300;
pub const DEFAULT_CATEGORY: &str = "Geral";

/// Query string of `GET /api/books`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookListQuery {
    /// Case-insensitive match on title or author
    pub search: Option<String>,
    pub category: Option<String>,
    /// `price-asc`, `price-desc`; anything else sorts newest first
    pub sort: Option<String>,
    /// 1-based; values below 1 are treated as 1
    pub page: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookPage {
    pub books: Vec<book::Model>,
    pub total: u64,
    pub page: u64,
    pub total_pages: u64,
}

/// Body of `POST /api/admin/books`
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    #[validate(length(min = 1, message = "Título é obrigatório"))]
    pub title: String,
    #[validate(length(min = 1, message = "Autor é obrigatório"))]
    pub author: String,
    #[validate(custom = "validate_price")]
    #[schema(value_type = f64, example = 29.9)]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Estoque não pode ser negativo"))]
    #[serde(default)]
    pub stock: i32,
    #[validate(range(min = 1, message = "Peso deve ser positivo"))]
    pub weight_grams: Option<i32>,
    pub condition: Option<BookCondition>,
    pub category: Option<String>,
    pub isbn: Option<String>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
}

/// Body of `PUT /api/admin/books/:id`; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookRequest {
    #[validate(length(min = 1, message = "Título é obrigatório"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Autor é obrigatório"))]
    pub author: Option<String>,
    #[validate(custom = "validate_price")]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Estoque não pode ser negativo"))]
    pub stock: Option<i32>,
    #[validate(range(min = 1, message = "Peso deve ser positivo"))]
    pub weight_grams: Option<i32>,
    pub condition: Option<BookCondition>,
    pub category: Option<String>,
    pub isbn: Option<String>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || price.round_dp(2) != *price {
        let mut err = ValidationError::new("price");
        err.message = Some("Preço inválido".into());
        return Err(err);
    }
    Ok(())
}

/// Catalog browsing and back-office book maintenance
#[derive(Clone)]
pub struct CatalogService {
    books: BookRepository,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            books: BookRepository::new(db_pool),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_books(&self, query: BookListQuery) -> Result<BookPage, ServiceError> {
        let page = query.page.unwrap_or(1).max(1) as u64;
        let filter = BookFilter {
            search: query.search,
            category: query.category,
            sort: BookSort::parse(query.sort.as_deref()),
            page,
        };

        let (books, total) = self.books.list(&filter).await?;
        Ok(BookPage {
            books,
            total,
            page,
            total_pages: total.div_ceil(BOOKS_PAGE_SIZE),
        })
    }

    pub async fn get_book(&self, id: Uuid) -> Result<book::Model, ServiceError> {
        self.books
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Livro não encontrado".to_string()))
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_book(&self, request: CreateBookRequest) -> Result<book::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let category = request
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let book = self
            .books
            .create(BookActiveModel {
                id: Set(Uuid::new_v4()),
                title: Set(request.title.trim().to_string()),
                author: Set(request.author.trim().to_string()),
                price: Set(request.price.round_dp(2)),
                stock: Set(request.stock),
                weight_grams: Set(request.weight_grams.unwrap_or(DEFAULT_WEIGHT_GRAMS)),
                condition: Set(request.condition.unwrap_or(BookCondition::Bom)),
                category: Set(category),
                isbn: Set(request.isbn),
                cover_image: Set(request.cover_image),
                description: Set(request.description),
                published_year: Set(request.published_year),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .await?;

        info!(book_id = %book.id, "book created");
        Ok(book)
    }

    #[instrument(skip(self, request))]
    pub async fn update_book(
        &self,
        id: Uuid,
        request: UpdateBookRequest,
    ) -> Result<book::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_book(id).await?;
        let mut active: BookActiveModel = existing.into();

        if let Some(title) = request.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(author) = request.author {
            active.author = Set(author.trim().to_string());
        }
        if let Some(price) = request.price {
            active.price = Set(price.round_dp(2));
        }
        if let Some(stock) = request.stock {
            active.stock = Set(stock);
        }
        if let Some(weight) = request.weight_grams {
            active.weight_grams = Set(weight);
        }
        if let Some(condition) = request.condition {
            active.condition = Set(condition);
        }
        if let Some(category) = request.category.filter(|c| !c.trim().is_empty()) {
            active.category = Set(category.trim().to_string());
        }
        if request.isbn.is_some() {
            active.isbn = Set(request.isbn);
        }
        if request.cover_image.is_some() {
            active.cover_image = Set(request.cover_image);
        }
        if request.description.is_some() {
            active.description = Set(request.description);
        }
        if request.published_year.is_some() {
            active.published_year = Set(request.published_year);
        }
        active.updated_at = Set(Utc::now());

        self.books.update(active).await
    }

    /// Order lines that referenced the book keep their snapshot price and lose the link
    #[instrument(skip(self))]
    pub async fn delete_book(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.books.delete(id).await? {
            return Err(ServiceError::NotFound("Livro não encontrado".to_string()));
        }
        info!(book_id = %id, "book deleted");
        Ok(())
    }
}
