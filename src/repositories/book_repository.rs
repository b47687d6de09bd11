use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{BaseRepository, Repository};
use crate::entities::book::{ActiveModel as BookActiveModel, Column, Entity as Book, Model};
use crate::errors::ServiceError;

/// Fixed catalog page size.
pub const BOOKS_PAGE_SIZE: u64 = 20;

/// Ordering accepted by the catalog listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSort {
    PriceAsc,
    PriceDesc,
    #[default]
    Newest,
}

impl BookSort {
    /// Unknown values fall back to newest first.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("price-asc") => BookSort::PriceAsc,
            Some("price-desc") => BookSort::PriceDesc,
            _ => BookSort::Newest,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: BookSort,
    /// 1-based page number
    pub page: u64,
}

/// Repository for catalog operations
#[derive(Debug, Clone)]
pub struct BookRepository {
    base: BaseRepository,
}

impl BookRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Lists one catalog page together with the total number of matches
    pub async fn list(&self, filter: &BookFilter) -> Result<(Vec<Model>, u64), ServiceError> {
        let mut query = Book::find();

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(Column::Title))).like(pattern.clone()))
                    .add(Expr::expr(Func::lower(Expr::col(Column::Author))).like(pattern)),
            );
        }

        if let Some(category) = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            query = query.filter(Column::Category.eq(category));
        }

        query = match filter.sort {
            BookSort::PriceAsc => query.order_by_asc(Column::Price),
            BookSort::PriceDesc => query.order_by_desc(Column::Price),
            BookSort::Newest => query.order_by_desc(Column::CreatedAt),
        };

        let paginator = query.paginate(self.base.get_db(), BOOKS_PAGE_SIZE);
        let total = paginator.num_items().await?;
        let page_index = filter.page.max(1) - 1;
        // pages past the end are empty; sea-orm would overflow computing their offset
        let books = if page_index.saturating_mul(BOOKS_PAGE_SIZE) >= total {
            Vec::new()
        } else {
            paginator.fetch_page(page_index).await?
        };

        Ok((books, total))
    }

    /// Find a book by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, ServiceError> {
        Ok(Book::find_by_id(id).one(self.base.get_db()).await?)
    }

    pub async fn create(&self, book: BookActiveModel) -> Result<Model, ServiceError> {
        Ok(book.insert(self.base.get_db()).await?)
    }

    pub async fn update(&self, book: BookActiveModel) -> Result<Model, ServiceError> {
        Ok(book.update(self.base.get_db()).await?)
    }

    /// Returns false when no book had that id
    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let result = Book::delete_by_id(id).exec(self.base.get_db()).await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn count(&self) -> Result<u64, ServiceError> {
        Ok(Book::find().count(self.base.get_db()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::book::BookCondition;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sea_orm::Set;

    async fn repo() -> BookRepository {
        let db = crate::db::establish_connection("sqlite::memory:")
            .await
            .expect("connect");
        crate::db::run_migrations(&db).await.expect("migrate");
        BookRepository::new(Arc::new(db))
    }

    async fn add(repo: &BookRepository, title: &str, author: &str, price: Decimal, category: &str, age_days: i64) {
        let at = Utc::now() - Duration::days(age_days);
        repo.create(BookActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.into()),
            author: Set(author.into()),
            price: Set(price),
            stock: Set(1),
            weight_grams: Set(300),
            condition: Set(BookCondition::Bom),
            category: Set(category.into()),
            isbn: Set(None),
            cover_image: Set(None),
            description: Set(None),
            published_year: Set(None),
            created_at: Set(at),
            updated_at: Set(at),
        })
        .await
        .expect("insert");
    }

    #[tokio::test]
    async fn search_matches_title_or_author_ignoring_case() {
        let repo = repo().await;
        add(&repo, "1984", "George Orwell", dec!(29.90), "Distopia", 1).await;
        add(&repo, "Dom Casmurro", "Machado de Assis", dec!(15.00), "Literatura Brasileira", 2).await;
        add(&repo, "A Revolução dos Bichos", "George Orwell", dec!(22.00), "Distopia", 3).await;

        let (books, total) = repo
            .list(&BookFilter {
                search: Some("ORWELL".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(books.iter().all(|b| b.author == "George Orwell"));

        let (books, _) = repo
            .list(&BookFilter {
                search: Some("casmurro".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(books.len(), 1);
    }

    #[tokio::test]
    async fn sorting_and_category_filter() {
        let repo = repo().await;
        add(&repo, "Barato", "A", dec!(10.00), "Fantasia", 3).await;
        add(&repo, "Caro", "B", dec!(50.00), "Fantasia", 2).await;
        add(&repo, "Novo", "C", dec!(20.00), "História", 0).await;

        let (books, _) = repo
            .list(&BookFilter {
                sort: BookSort::PriceDesc,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(books[0].title, "Caro");

        let (books, _) = repo.list(&BookFilter::default()).await.unwrap();
        assert_eq!(books[0].title, "Novo");

        let (books, total) = repo
            .list(&BookFilter {
                category: Some("Fantasia".into()),
                sort: BookSort::PriceAsc,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(books[0].title, "Barato");
    }

    #[tokio::test]
    async fn pages_hold_twenty_books() {
        let repo = repo().await;
        for i in 0..25 {
            add(&repo, &format!("Livro {i}"), "Autor", dec!(10.00), "Geral", i).await;
        }

        let (first, total) = repo
            .list(&BookFilter {
                page: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        let (second, _) = repo
            .list(&BookFilter {
                page: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 25);
        assert_eq!(first.len(), 20);
        assert_eq!(second.len(), 5);
    }

    #[tokio::test]
    async fn pages_past_the_end_are_empty() {
        let repo = repo().await;
        add(&repo, "1984", "George Orwell", dec!(29.90), "Distopia", 1).await;

        for page in [2, u64::MAX / 2, u64::MAX] {
            let (books, total) = repo
                .list(&BookFilter {
                    page,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(total, 1, "page {page}");
            assert!(books.is_empty(), "page {page}");
        }
    }

    #[test]
    fn unknown_sort_falls_back_to_newest() {
        assert_eq!(BookSort::parse(Some("price-asc")), BookSort::PriceAsc);
        assert_eq!(BookSort::parse(Some("price-desc")), BookSort::PriceDesc);
        assert_eq!(BookSort::parse(Some("title")), BookSort::Newest);
        assert_eq!(BookSort::parse(None), BookSort::Newest);
    }
}
