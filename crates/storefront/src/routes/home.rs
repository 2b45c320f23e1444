//! Catalog page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::instrument;

use coffeehouse_core::CategoryId;

use crate::backend::{Category, Product, ProductQuery, ProductSort};
use crate::filters;
use crate::middleware::CspNonce;
use crate::navigation::Navigation;
use crate::session::SessionStore;
use crate::state::AppState;

/// Shown when a product has no image.
pub const DEFAULT_PRODUCT_IMAGE: &str = "/static/images/default-product.svg";

// =============================================================================
// View Types
// =============================================================================

/// Product card display data.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: i32,
    pub name: String,
    pub price: String,
    pub image_url: String,
    pub category_name: Option<String>,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            price: product.price.to_string(),
            image_url: product
                .image_url
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_PRODUCT_IMAGE.to_string()),
            category_name: product.category_name.clone(),
        }
    }
}

/// Category card display data.
#[derive(Debug, Clone)]
pub struct CategoryCard {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub selected: bool,
}

impl CategoryCard {
    fn new(category: &Category, selected: Option<CategoryId>) -> Self {
        Self {
            id: category.id.as_i32(),
            name: category.name.clone(),
            description: category.description.clone().unwrap_or_default(),
            selected: selected == Some(category.id),
        }
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Catalog query string.
///
/// Parsed leniently: blank or malformed filters are ignored rather than
/// rejected, since they come straight from a GET form.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub sort_by: Option<String>,
    pub error: Option<String>,
}

impl CatalogQuery {
    /// The filters to forward to the backend.
    #[must_use]
    pub fn product_query(&self) -> ProductQuery {
        ProductQuery {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            category_id: self
                .category_id
                .as_deref()
                .and_then(|id| id.trim().parse::<i32>().ok())
                .map(CategoryId::new),
            sort_by: match self.sort_by.as_deref() {
                Some("name") => Some(ProductSort::Name),
                Some("price") => Some(ProductSort::Price),
                _ => None,
            },
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Catalog page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav: Navigation,
    pub nonce: String,
    pub error: Option<&'static str>,
    pub products: Vec<ProductCard>,
    pub categories: Vec<CategoryCard>,
    pub search: String,
    pub sort_by: &'static str,
    pub filtered: bool,
}

/// Display the catalog.
///
/// Products and categories are fetched independently; a failure in one
/// leaves only that section empty.
#[instrument(skip(state, session, nonce))]
pub async fn home(
    State(state): State<AppState>,
    mut session: SessionStore,
    CspNonce(nonce): CspNonce,
    Query(query): Query<CatalogQuery>,
) -> HomeTemplate {
    let nav = Navigation::load(&state, &mut session).await;
    let filters = query.product_query();

    let products = match state.backend().list_products(&session, &filters).await {
        Ok(products) => products.iter().map(ProductCard::from).collect(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load products");
            Vec::new()
        }
    };

    let categories = match state.backend().list_categories(&session).await {
        Ok(categories) => categories
            .iter()
            .map(|category| CategoryCard::new(category, filters.category_id))
            .collect(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load categories");
            Vec::new()
        }
    };

    HomeTemplate {
        nav,
        nonce,
        error: query.error.as_deref().map(super::error_message),
        products,
        categories,
        search: filters.search.clone().unwrap_or_default(),
        sort_by: match filters.sort_by {
            Some(ProductSort::Name) => "name",
            Some(ProductSort::Price) => "price",
            None => "",
        },
        filtered: filters.is_filtered(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use coffeehouse_core::{Price, ProductId};

    use super::*;

    #[test]
    fn test_catalog_query_ignores_blank_and_bad_filters() {
        let query = CatalogQuery {
            search: Some("   ".to_string()),
            category_id: Some("abc".to_string()),
            sort_by: Some("rating".to_string()),
            error: None,
        };
        assert_eq!(query.product_query(), ProductQuery::default());
    }

    #[test]
    fn test_catalog_query_forwards_filters() {
        let query = CatalogQuery {
            search: Some(" latte ".to_string()),
            category_id: Some("3".to_string()),
            sort_by: Some("price".to_string()),
            error: None,
        };
        let filters = query.product_query();
        assert_eq!(filters.search.as_deref(), Some("latte"));
        assert_eq!(filters.category_id, Some(CategoryId::new(3)));
        assert_eq!(filters.sort_by, Some(ProductSort::Price));
    }

    #[test]
    fn test_product_card_defaults_image_and_formats_price() {
        let product = Product {
            id: ProductId::new(42),
            name: "Cappuccino".to_string(),
            price: Price::from_minor(25050),
            description: None,
            category_id: None,
            category_name: None,
            image_url: None,
        };
        let card = ProductCard::from(&product);
        assert_eq!(card.image_url, DEFAULT_PRODUCT_IMAGE);
        assert_eq!(card.price, "250.5 ₽");
    }
}
