//! Bookshop API Library
//!
//! HTTP backend of a used-book store: catalog, shipping quotes, card checkout,
//! signed payment notifications and order tracking.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod integrations;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;
pub mod webhooks;

use axum::{routing::get, Extension, Router};
use std::sync::Arc;

use crate::auth::{AuthRouterExt, AuthService};
use crate::config::AppConfig;
use crate::db::DbPool;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: AppConfig, providers: handlers::Providers) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config, providers);
        Self {
            db,
            config: Arc::new(config),
            services,
        }
    }

    pub fn auth_service(&self) -> Arc<AuthService> {
        self.services.auth.clone()
    }
}

/// Everything under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/books", handlers::books::book_routes())
        .nest("/shipping", handlers::shipping::shipping_routes())
        .nest("/stripe", handlers::payments::payment_routes())
        .nest("/orders", handlers::orders::order_routes().with_auth())
        .nest("/users", handlers::users::user_routes().with_auth())
        .nest("/admin", handlers::admin::admin_routes())
}

/// Full application: status endpoints, API, docs and the per-request layers
pub fn app_router(state: AppState) -> Router {
    let auth_service = state.auth_service();

    Router::new()
        .route("/", get(handlers::health::root_status))
        .route("/health", get(handlers::health::health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Inject AuthService into request extensions for auth middleware
        .layer(Extension(auth_service))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn app() -> Router {
        let db = db::establish_connection("sqlite::memory:").await.unwrap();
        db::run_migrations(&db).await.unwrap();
        let db = Arc::new(db);
        let config = AppConfig::new(
            "sqlite::memory:".into(),
            "router-test-secret".into(),
            "127.0.0.1".into(),
            0,
            "test".into(),
        );
        let providers = handlers::Providers::from_config(db.clone(), &config).unwrap();
        app_router(AppState::new(db, config, providers))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn root_and_health_answer() {
        let (status, body) = get(app().await, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Sebo API rodando");

        let (status, body) = get(app().await, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "up");
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        for uri in ["/api/orders", "/api/users/me", "/api/admin/stats"] {
            let (status, body) = get(app().await, uri).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "Token não fornecido");
        }
    }

    #[tokio::test]
    async fn unknown_book_id_is_not_found() {
        let (status, body) = get(app().await, "/api/books/not-a-uuid").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Livro não encontrado");
        assert!(body["timestamp"].is_string());
    }
}
