//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Catalog (products + categories)
//! GET  /health                        - Health check
//!
//! # Cart
//! GET  /cart                          - Cart page
//! POST /cart/add                      - Add one unit (count fragment for HTMX, redirect otherwise)
//! GET  /cart/count                    - Cart count badge (fragment)
//! POST /cart/checkout                 - Turn the cart into an order
//!
//! # Auth
//! GET  /auth/login                    - Login page
//! POST /auth/login                    - Login action
//! GET  /auth/register                 - Register page
//! POST /auth/register                 - Register action
//! POST /auth/logout                   - Logout action
//!
//! # Admin console (requires admin role)
//! GET  /admin                         - Redirect to the products section
//! GET  /admin/{section}               - products | categories | orders | users
//! GET  /admin/products/{id}/edit      - Product edit form
//! POST /admin/products/{id}/edit      - Save product
//! POST /admin/products/{id}/delete    - Delete product
//! POST /admin/categories/{id}/delete  - Delete category
//! POST /admin/orders/{id}/status      - Change order status
//! POST /admin/users/{id}/role         - Change user role
//! POST /admin/logout                  - Logout action
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod home;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Deserialize;

use crate::state::AppState;

/// Query parameters carrying a flash message code.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

impl MessageQuery {
    /// The visitor-facing message for the error code, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&'static str> {
        self.error.as_deref().map(error_message)
    }
}

/// Visitor-facing text for an error code carried in `?error=`.
///
/// Messages are deliberately generic; backend detail is only logged.
#[must_use]
pub fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password",
        "password_mismatch" => "Passwords do not match",
        "password_too_short" => "Password must be at least 6 characters",
        "registration_failed" => "Registration failed. The email may already be in use.",
        "cart" => "Could not add the item to your cart",
        "order" => "Could not place your order",
        "action" => "The action failed. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/count", get(cart::count))
        .route("/checkout", post(cart::checkout))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the admin console routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::index))
        .route("/logout", post(auth::logout))
        .route("/{section}", get(admin::section))
        .route(
            "/products/{id}/edit",
            get(admin::edit_product_page).post(admin::update_product),
        )
        .route("/products/{id}/delete", post(admin::delete_product))
        .route("/categories/{id}/delete", post(admin::delete_category))
        .route("/orders/{id}/status", post(admin::update_order_status))
        .route("/users/{id}/role", post(admin::update_user_role))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/cart", cart_routes())
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes())
}
