#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use bookshop_api::{
    app_router,
    config::AppConfig,
    db,
    entities::{book, user::UserRole},
    handlers::Providers,
    services::{
        accounts::RegisterRequest, admin::UpdateRoleRequest, catalog::CreateBookRequest,
    },
    webhooks::{sign_payload, SIGNATURE_HEADER},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::MockServer;

pub const WEBHOOK_SECRET: &str = "whsec_integration_test_secret";
pub const GOOGLE_CLIENT_ID: &str = "bookshop-test.apps.googleusercontent.com";

/// Shared harness: migrated in-memory database, stubbed providers and the full router
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub stripe: MockServer,
    pub shipping: MockServer,
    pub google: MockServer,
}

/// Status and decoded JSON body of a response
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let stripe = MockServer::start().await;
        let shipping = MockServer::start().await;
        let google = MockServer::start().await;

        let pool = db::establish_connection("sqlite::memory:")
            .await
            .expect("connect to in-memory sqlite");
        db::run_migrations(&pool).await.expect("run migrations");
        let pool = Arc::new(pool);

        let mut config = AppConfig::new(
            "sqlite::memory:".to_string(),
            "integration_test_secret_that_is_long_enough_for_hs256".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        config.stripe_secret_key = "sk_test_bookshop".to_string();
        config.stripe_webhook_secret = WEBHOOK_SECRET.to_string();
        config.stripe_api_base = stripe.uri();
        config.shipping_api_url = format!("{}/api/v2", shipping.uri());
        config.shipping_api_token = "melhor-envio-test-token".to_string();
        config.google_client_id = Some(GOOGLE_CLIENT_ID.to_string());
        config.google_tokeninfo_url = format!("{}/tokeninfo", google.uri());
        config.google_userinfo_url = format!("{}/userinfo", google.uri());

        let providers =
            Providers::from_config(pool.clone(), &config).expect("build provider clients");
        let state = AppState::new(pool, config, providers);
        let router = app_router(state.clone());

        Self {
            router,
            state,
            stripe,
            shipping,
            google,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        let request = builder.body(body).expect("build request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, token).await
    }

    /// Deliver a webhook body signed with the configured secret
    pub async fn deliver_webhook(&self, event: &Value) -> TestResponse {
        let payload = serde_json::to_vec(event).expect("serialize event");
        let signature = sign_payload(&payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp())
            .expect("sign payload");
        self.deliver_raw_webhook(payload, Some(&signature)).await
    }

    pub async fn deliver_raw_webhook(
        &self,
        payload: Vec<u8>,
        signature: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/stripe/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        let request = builder.body(Body::from(payload)).expect("build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }

    /// Register a customer through the account service and return its token
    pub async fn register_customer(&self, name: &str, email: &str, password: &str) -> (Uuid, String) {
        let response = self
            .state
            .services
            .accounts
            .register(RegisterRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .expect("register customer");
        (response.user.id, response.token)
    }

    /// Register an account, promote it and return an administrator token
    pub async fn register_admin(&self, email: &str) -> (Uuid, String) {
        let (id, _) = self.register_customer("Admin", email, "admin-password").await;
        self.state
            .services
            .admin
            .update_role(
                id,
                UpdateRoleRequest {
                    role: "ADMIN".to_string(),
                },
            )
            .await
            .expect("promote admin");
        let token = self
            .state
            .auth_service()
            .issue_token(id, UserRole::Admin)
            .expect("issue admin token");
        (id, token)
    }

    pub async fn seed_book(&self, title: &str, price: Decimal, stock: i32) -> book::Model {
        self.state
            .services
            .catalog
            .create_book(CreateBookRequest {
                title: title.to_string(),
                author: "Autor de Teste".to_string(),
                price,
                stock,
                weight_grams: Some(300),
                condition: None,
                category: Some("Ficção".to_string()),
                isbn: None,
                cover_image: None,
                description: None,
                published_year: None,
            })
            .await
            .expect("seed book")
    }

    pub async fn book(&self, id: Uuid) -> book::Model {
        self.state
            .services
            .catalog
            .get_book(id)
            .await
            .expect("load book")
    }
}

/// Delivery address accepted by checkout
pub fn address() -> Value {
    json!({
        "cep": "20040-002",
        "address": "Avenida Rio Branco",
        "number": "156",
        "complement": "Sala 10",
        "city": "Rio de Janeiro",
        "state": "RJ"
    })
}

/// A `payment_intent.succeeded` event for `order_id`
pub fn payment_succeeded(event_id: &str, intent_id: &str, order_id: Uuid) -> Value {
    json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": intent_id,
                "object": "payment_intent",
                "metadata": { "orderId": order_id.to_string() }
            }
        }
    })
}
