//! Wire types for the Coffeehouse REST backend.
//!
//! These mirror the backend's JSON payloads. Optional fields are optional
//! because the backend omits or nulls them in some responses.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use coffeehouse_core::{
    CartId, CartItemId, CategoryId, OrderId, OrderItemId, OrderStatus, Price, ProductId, Role,
    UserId,
};

// =============================================================================
// Auth
// =============================================================================

/// Token issued by `POST /auth/authentication`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Body of `POST /auth/registration`.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A backend user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl User {
    /// Whether the user may open the admin console.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Body of `PATCH /auth/user/{id}/role`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RoleUpdate {
    pub role: Role,
}

// =============================================================================
// Catalog
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
}

/// Body of `PUT /products/product/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub image_url: Option<String>,
    /// The backend rejects product updates without a category.
    pub category_id: CategoryId,
}

/// Server-side filters for `GET /products/products`.
///
/// Ordering is always the backend's; the storefront never re-sorts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<ProductSort>,
}

impl ProductQuery {
    /// Whether any filter is set.
    #[must_use]
    pub const fn is_filtered(&self) -> bool {
        self.search.is_some() || self.category_id.is_some()
    }
}

/// Sort keys the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Name,
    Price,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// Cart
// =============================================================================

/// The visitor's server-owned cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub id: Option<CartId>,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Total number of units across all lines, saturating at `u32::MAX`.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |total, item| total.saturating_add(item.quantity))
    }
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(default)]
    pub id: Option<CartItemId>,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `POST /cart`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CartItemInput {
    pub product_id: ProductId,
    pub quantity: u32,
}

// =============================================================================
// Orders
// =============================================================================

/// An order created from a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub total_amount: Price,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// One order line, priced at the time of ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Price,
}

// =============================================================================
// Errors
// =============================================================================

/// Error payload returned with non-success statuses.
///
/// `detail` is a string for most errors but a list of objects for
/// validation failures, so it is kept as raw JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Human-readable detail, if the backend sent one.
    #[must_use]
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
