pub mod admin;
pub mod auth;
pub mod books;
pub mod common;
pub mod health;
pub mod orders;
pub mod payments;
pub mod shipping;
pub mod users;

use std::sync::Arc;

use crate::auth::{AuthConfig, AuthService, GoogleClient, GoogleIdentityVerifier};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::integrations::{MelhorEnvioClient, PaymentGateway, RateAggregator, StripeClient};
use crate::repositories::{CheckoutStore, SeaOrmCheckoutStore};
use crate::services::{
    accounts::AccountService, admin::AdminService, catalog::CatalogService,
    checkout::CheckoutService, orders::OrderService, reconciler::WebhookReconciler,
    shipping::ShippingService, users::UserService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Outbound ports the services depend on; tests swap in fakes
#[derive(Clone)]
pub struct Providers {
    pub store: Arc<dyn CheckoutStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub rates: Arc<dyn RateAggregator>,
    pub google: Arc<dyn GoogleIdentityVerifier>,
}

impl Providers {
    /// Database-backed store and HTTP clients built from configuration
    pub fn from_config(db_pool: Arc<DbPool>, config: &AppConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            store: Arc::new(SeaOrmCheckoutStore::new(db_pool)),
            payments: Arc::new(StripeClient::from_config(config)?),
            rates: Arc::new(MelhorEnvioClient::from_config(config)?),
            google: Arc::new(GoogleClient::from_config(config)?),
        })
    }
}

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub users: Arc<UserService>,
    pub catalog: Arc<CatalogService>,
    pub shipping: Arc<ShippingService>,
    pub checkout: Arc<CheckoutService>,
    pub reconciler: Arc<WebhookReconciler>,
    pub orders: Arc<OrderService>,
    pub admin: Arc<AdminService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig, providers: Providers) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(config)));

        Self {
            accounts: Arc::new(AccountService::new(
                db_pool.clone(),
                auth.clone(),
                providers.google,
            )),
            users: Arc::new(UserService::new(db_pool.clone())),
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            shipping: Arc::new(ShippingService::new(
                providers.store.clone(),
                providers.rates,
                config.store_postal_code.clone(),
            )),
            checkout: Arc::new(CheckoutService::new(
                providers.store.clone(),
                providers.payments,
                config.currency.clone(),
            )),
            reconciler: Arc::new(WebhookReconciler::new(
                providers.store,
                config.stripe_webhook_secret.clone(),
                config.stripe_webhook_tolerance_secs,
            )),
            orders: Arc::new(OrderService::new(db_pool.clone())),
            admin: Arc::new(AdminService::new(db_pool)),
            auth,
        }
    }
}
