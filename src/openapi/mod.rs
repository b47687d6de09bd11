use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Registers the bearer scheme referenced by `security(("Bearer" = []))`
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshop API",
        version = "1.0.0",
        description = r#"
Backend of a used-book store: catalog, shipping quotes, card checkout and order tracking.

## Authentication

Sign in through `/api/auth/*` and send the returned token on every protected call:

```
Authorization: Bearer <token>
```

Tokens are valid for seven days. Back-office endpoints under `/api/admin` require the `ADMIN` role.

## Errors

Every error has the same body:

```json
{ "error": "Livro não encontrado", "requestId": "...", "timestamp": "2026-03-09T10:30:00Z" }
```
        "#,
    ),
    tags(
        (name = "auth", description = "Registration and sign-in"),
        (name = "books", description = "Public catalog"),
        (name = "shipping", description = "Delivery quotes"),
        (name = "payments", description = "Checkout and processor notifications"),
        (name = "orders", description = "Customer order history"),
        (name = "users", description = "Profile of the signed-in account"),
        (name = "admin", description = "Back office")
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::google_login,
        crate::handlers::books::list_books,
        crate::handlers::books::get_book,
        crate::handlers::shipping::calculate_shipping,
        crate::handlers::payments::create_intent,
        crate::handlers::payments::stripe_webhook,
        crate::handlers::orders::list_my_orders,
        crate::handlers::orders::get_my_order,
        crate::handlers::users::get_me,
        crate::handlers::users::update_me,
        crate::handlers::users::update_address,
        crate::handlers::users::change_password,
        crate::handlers::users::update_preferences,
        crate::handlers::users::delete_me,
        crate::handlers::admin::stats,
        crate::handlers::admin::list_users,
        crate::handlers::admin::update_user_role,
        crate::handlers::orders::list_all_orders,
        crate::handlers::orders::update_order,
        crate::handlers::books::create_book,
        crate::handlers::books::update_book,
        crate::handlers::books::delete_book,
    ),
    components(
        schemas(
            crate::entities::book::Model,
            crate::entities::book::BookCondition,
            crate::entities::order::OrderStatus,
            crate::entities::order::ShippingAddress,
            crate::entities::user::UserRole,
            crate::entities::user::Preferences,
            crate::services::catalog::BookPage,
            crate::services::catalog::CreateBookRequest,
            crate::services::catalog::UpdateBookRequest,
            crate::services::shipping::CartItem,
            crate::services::shipping::ShippingQuoteRequest,
            crate::services::shipping::ShippingQuote,
            crate::services::checkout::ShippingOption,
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CheckoutResponse,
            crate::services::reconciler::WebhookAck,
            crate::services::orders::OrderView,
            crate::services::orders::OrderItemView,
            crate::services::orders::AdminOrderView,
            crate::services::orders::CustomerSummary,
            crate::services::orders::UpdateOrderRequest,
            crate::services::accounts::UserSummary,
            crate::services::accounts::AuthResponse,
            crate::services::accounts::RegisterRequest,
            crate::services::accounts::LoginRequest,
            crate::services::accounts::GoogleLoginRequest,
            crate::services::accounts::GoogleUserInfo,
            crate::services::users::ProfileView,
            crate::services::users::UpdateProfileRequest,
            crate::services::users::AddressRequest,
            crate::services::users::ChangePasswordRequest,
            crate::services::users::PreferencesView,
            crate::services::admin::StoreStats,
            crate::services::admin::AdminUserView,
            crate::services::admin::UpdateRoleRequest,
            crate::handlers::common::MessageResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_public_route() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = json["paths"].as_object().unwrap();
        for path in [
            "/api/auth/register",
            "/api/books/{id}",
            "/api/shipping/calculate",
            "/api/stripe/webhook",
            "/api/users/me/password",
            "/api/admin/orders/{id}",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(json["components"]["securitySchemes"]["Bearer"].is_object());
    }
}
