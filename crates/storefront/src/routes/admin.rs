//! Admin console route handlers.
//!
//! Every handler takes [`RequireAdmin`], so visitors without an admin token
//! are redirected home before anything is fetched or rendered. Section data
//! is fetched fresh on every page load.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use coffeehouse_core::{CategoryId, OrderId, OrderStatus, Price, ProductId, Role, UserId};

use crate::backend::{
    BackendClient, BackendError, Category, Order, Product, ProductInput, ProductQuery, User,
};
use crate::error::{self, AppError};
use crate::filters;
use crate::middleware::{CspNonce, RequireAdmin};
use crate::navigation::Navigation;
use crate::session::SessionStore;
use crate::state::AppState;

use super::MessageQuery;

// =============================================================================
// Sections
// =============================================================================

/// A panel of the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminSection {
    #[default]
    Products,
    Categories,
    Orders,
    Users,
}

impl AdminSection {
    /// Every section, in menu order.
    pub const ALL: [Self; 4] = [Self::Products, Self::Categories, Self::Orders, Self::Users];

    /// URL segment of the section.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Orders => "orders",
            Self::Users => "users",
        }
    }

    /// Menu label of the section.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Products => "Products",
            Self::Categories => "Categories",
            Self::Orders => "Orders",
            Self::Users => "Users",
        }
    }

    /// Path of the section page.
    #[must_use]
    pub fn path(self) -> String {
        format!("/admin/{}", self.slug())
    }

    /// Fetch the rows shown in this section.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the backend call fails.
    #[instrument(skip(backend, session))]
    pub async fn load(
        self,
        backend: &BackendClient,
        session: &SessionStore,
    ) -> Result<SectionData, BackendError> {
        Ok(match self {
            Self::Products => {
                let products = backend.list_products(session, &ProductQuery::default()).await?;
                SectionData::Products(products.iter().map(ProductRow::from).collect())
            }
            Self::Categories => {
                let categories = backend.list_categories(session).await?;
                SectionData::Categories(categories.iter().map(CategoryRow::from).collect())
            }
            Self::Orders => {
                let orders = backend.list_orders(session).await?;
                SectionData::Orders(orders.iter().map(OrderRow::from).collect())
            }
            Self::Users => {
                let users = backend.list_users(session).await?;
                SectionData::Users(users.iter().map(UserRow::from).collect())
            }
        })
    }
}

impl FromStr for AdminSection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.slug() == s)
            .ok_or_else(|| AppError::NotFound(format!("admin section {s}")))
    }
}

/// One menu entry; exactly one is active per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub slug: &'static str,
    pub title: &'static str,
    pub active: bool,
}

/// The admin menu with `active` selected.
#[must_use]
pub fn menu(active: AdminSection) -> Vec<MenuItem> {
    AdminSection::ALL
        .into_iter()
        .map(|section| MenuItem {
            slug: section.slug(),
            title: section.title(),
            active: section == active,
        })
        .collect()
}

// =============================================================================
// Rows
// =============================================================================

/// Rows of the active section.
#[derive(Debug, Clone)]
pub enum SectionData {
    Products(Vec<ProductRow>),
    Categories(Vec<CategoryRow>),
    Orders(Vec<OrderRow>),
    Users(Vec<UserRow>),
    /// The section could not be loaded.
    Unavailable,
}

/// An option of a `<select>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: i32,
    pub name: String,
    pub price: String,
    pub category: String,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            price: product.price.to_string(),
            category: product
                .category_name
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub id: i32,
    pub name: String,
    pub description: String,
}

impl From<&Category> for CategoryRow {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.as_i32(),
            name: category.name.clone(),
            description: category
                .description
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: i32,
    pub user_id: i32,
    pub total: String,
    pub created: String,
    pub statuses: Vec<SelectOption>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.as_i32(),
            user_id: order.user_id.as_i32(),
            total: order.total_amount.to_string(),
            created: order
                .created_at
                .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string()),
            statuses: OrderStatus::ALL
                .into_iter()
                .map(|status| SelectOption {
                    value: status.as_str(),
                    selected: status == order.status,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub roles: Vec<SelectOption>,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.as_i32(),
            username: user.username.clone(),
            email: user.email.clone().unwrap_or_else(|| "-".to_string()),
            roles: Role::ALL
                .into_iter()
                .map(|role| SelectOption {
                    value: role.as_str(),
                    selected: role == user.role,
                })
                .collect(),
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Product edit form data.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category_id: String,
}

impl ProductForm {
    /// Validate the form into a backend payload.
    ///
    /// Returns `None` for a blank name, a price that is not a non-negative
    /// decimal, or a missing category.
    #[must_use]
    pub fn to_input(&self) -> Option<ProductInput> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }

        let price = Decimal::from_str(self.price.trim()).ok()?;
        if price.is_sign_negative() {
            return None;
        }

        let category_id = CategoryId::new(self.category_id.trim().parse::<i32>().ok()?);

        let optional = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());

        Some(ProductInput {
            name: name.to_string(),
            description: optional(&self.description),
            price: Price::new(price),
            image_url: optional(&self.image_url),
            category_id,
        })
    }
}

/// Order status form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// User role form data.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Admin console page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub nav: Navigation,
    pub nonce: String,
    pub error: Option<&'static str>,
    pub admin_name: String,
    pub menu: Vec<MenuItem>,
    pub data: SectionData,
}

/// Category choice in the product edit form.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub id: i32,
    pub name: String,
    pub selected: bool,
}

/// Product edit page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/product_edit.html")]
pub struct ProductEditTemplate {
    pub nav: Navigation,
    pub nonce: String,
    pub error: Option<&'static str>,
    pub menu: Vec<MenuItem>,
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: String,
    pub categories: Vec<CategoryOption>,
    /// Whether one of `categories` is preselected.
    pub has_category: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Redirect to the default section.
pub async fn index(_admin: RequireAdmin) -> Redirect {
    Redirect::to(&AdminSection::default().path())
}

/// Display one admin section.
///
/// Unknown sections are a 404. A section whose data cannot be fetched is
/// still rendered, with a notice in place of the table.
#[instrument(skip(state, admin, nonce, query))]
pub async fn section(
    State(state): State<AppState>,
    admin: RequireAdmin,
    CspNonce(nonce): CspNonce,
    Path(slug): Path<String>,
    Query(query): Query<MessageQuery>,
) -> error::Result<DashboardTemplate> {
    let section = slug.parse::<AdminSection>()?;
    let RequireAdmin { user, session } = admin;

    let data = match section.load(state.backend(), &session).await {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(error = %e, section = section.slug(), "Failed to load admin section");
            SectionData::Unavailable
        }
    };

    Ok(DashboardTemplate {
        nav: Navigation::for_user(state.backend(), &session, Some(&user)).await,
        nonce,
        error: query.error_message(),
        admin_name: user.username,
        menu: menu(section),
        data,
    })
}

/// Display the product edit form.
#[instrument(skip(state, admin, nonce, query))]
pub async fn edit_product_page(
    State(state): State<AppState>,
    admin: RequireAdmin,
    CspNonce(nonce): CspNonce,
    Path(id): Path<ProductId>,
    Query(query): Query<MessageQuery>,
) -> error::Result<ProductEditTemplate> {
    let RequireAdmin { user, session } = admin;

    let product = state.backend().get_product(&session, id).await?;
    let categories = state
        .backend()
        .list_categories(&session)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load categories for product form");
            Vec::new()
        });

    let categories: Vec<CategoryOption> = categories
        .iter()
        .map(|category| CategoryOption {
            id: category.id.as_i32(),
            name: category.name.clone(),
            selected: product.category_id == Some(category.id),
        })
        .collect();

    Ok(ProductEditTemplate {
        nav: Navigation::for_user(state.backend(), &session, Some(&user)).await,
        nonce,
        error: query.error_message(),
        menu: menu(AdminSection::Products),
        id: product.id.as_i32(),
        name: product.name.clone(),
        description: product.description.clone().unwrap_or_default(),
        price: product.price.display_amount().to_string(),
        image_url: product.image_url.clone().unwrap_or_default(),
        has_category: categories.iter().any(|option| option.selected),
        categories,
    })
}

/// Save the product edit form.
#[instrument(skip(state, admin, form))]
pub async fn update_product(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductForm>,
) -> Redirect {
    let Some(input) = form.to_input() else {
        return Redirect::to(&format!("/admin/products/{id}/edit?error=action"));
    };

    match state.backend().update_product(&admin.session, id, &input).await {
        Ok(_) => Redirect::to(&AdminSection::Products.path()),
        Err(e) => {
            tracing::warn!(error = %e, product_id = %id, "Failed to update product");
            Redirect::to(&format!("/admin/products/{id}/edit?error=action"))
        }
    }
}

/// Delete a product.
#[instrument(skip(state, admin))]
pub async fn delete_product(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<ProductId>,
) -> Redirect {
    let result = state.backend().delete_product(&admin.session, id).await;
    action_redirect(AdminSection::Products, result.map(|_| ()))
}

/// Delete a category.
#[instrument(skip(state, admin))]
pub async fn delete_category(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Redirect {
    let result = state.backend().delete_category(&admin.session, id).await;
    action_redirect(AdminSection::Categories, result.map(|_| ()))
}

/// Move an order to a new status.
#[instrument(skip(state, admin, form))]
pub async fn update_order_status(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Redirect {
    let Ok(status) = form.status.parse::<OrderStatus>() else {
        tracing::warn!(status = %form.status, "Unknown order status submitted");
        return action_failed(AdminSection::Orders);
    };

    let result = state
        .backend()
        .update_order_status(&admin.session, id, status)
        .await;
    action_redirect(AdminSection::Orders, result.map(|_| ()))
}

/// Change a user's role.
#[instrument(skip(state, admin, form))]
pub async fn update_user_role(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<UserId>,
    Form(form): Form<RoleForm>,
) -> Redirect {
    let Ok(role) = form.role.parse::<Role>() else {
        tracing::warn!(role = %form.role, "Unknown role submitted");
        return action_failed(AdminSection::Users);
    };

    let result = state.backend().update_user_role(&admin.session, id, role).await;
    action_redirect(AdminSection::Users, result.map(|_| ()))
}

/// Redirect back to `section`, flagging a failed action.
fn action_redirect(section: AdminSection, result: Result<(), BackendError>) -> Redirect {
    match result {
        Ok(()) => Redirect::to(&section.path()),
        Err(e) => {
            tracing::warn!(error = %e, section = section.slug(), "Admin action failed");
            action_failed(section)
        }
    }
}

/// Redirect back to `section` with the action error banner.
fn action_failed(section: AdminSection) -> Redirect {
    Redirect::to(&format!("{}?error=action", section.path()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_section_slugs_round_trip() {
        for section in AdminSection::ALL {
            assert_eq!(section.slug().parse::<AdminSection>().unwrap(), section);
        }
        assert!(matches!(
            "settings".parse::<AdminSection>(),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(AdminSection::default(), AdminSection::Products);
    }

    #[test]
    fn test_menu_has_exactly_one_active_item() {
        for active in AdminSection::ALL {
            let items = menu(active);
            assert_eq!(items.len(), 4);
            let active_items: Vec<_> = items.iter().filter(|item| item.active).collect();
            assert_eq!(active_items.len(), 1);
            assert_eq!(active_items[0].slug, active.slug());
        }
    }

    #[test]
    fn test_product_form_validation() {
        let form = ProductForm {
            name: " Mocha ".to_string(),
            description: String::new(),
            price: "320.50".to_string(),
            image_url: "  ".to_string(),
            category_id: "2".to_string(),
        };
        let input = form.to_input().unwrap();
        assert_eq!(input.name, "Mocha");
        assert_eq!(input.price, Price::from_minor(32050));
        assert!(input.description.is_none());
        assert!(input.image_url.is_none());
        assert_eq!(input.category_id, CategoryId::new(2));

        let no_category = ProductForm {
            category_id: String::new(),
            ..form.clone()
        };
        assert!(no_category.to_input().is_none());

        let bad_price = ProductForm {
            price: "-1".to_string(),
            ..form
        };
        assert!(bad_price.to_input().is_none());
    }

    #[test]
    fn test_order_row_marks_current_status() {
        let order = Order {
            id: OrderId::new(7),
            user_id: UserId::new(3),
            status: OrderStatus::Ready,
            total_amount: Price::from_minor(44000),
            created_at: None,
            items: Vec::new(),
        };
        let row = OrderRow::from(&order);
        assert_eq!(row.total, "440 ₽");
        assert_eq!(row.created, "-");
        let selected: Vec<_> = row.statuses.iter().filter(|o| o.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].value, "ready");
    }

    #[test]
    fn test_product_row_without_category() {
        let product = Product {
            id: ProductId::new(1),
            name: "Espresso".to_string(),
            price: Price::from_minor(15000),
            description: None,
            category_id: None,
            category_name: None,
            image_url: None,
        };
        let row = ProductRow::from(&product);
        assert_eq!(row.category, "-");
        assert_eq!(row.price, "150 ₽");
    }
}
