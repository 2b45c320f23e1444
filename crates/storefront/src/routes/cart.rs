//! Cart route handlers.
//!
//! The cart lives on the backend; these handlers only forward to it. Adding
//! works both as a plain form post and as an HTMX request that swaps in the
//! new count badge.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use coffeehouse_core::{OrderId, Price, ProductId};

use crate::backend::{BackendError, Cart, ProductQuery};
use crate::filters;
use crate::middleware::{CspNonce, RequireUser};
use crate::navigation::{Navigation, cart_count};
use crate::session::SessionStore;
use crate::state::AppState;

/// Header set by HTMX on every request it makes.
const HX_REQUEST: &str = "hx-request";

/// Whether the request came from HTMX.
fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key(HX_REQUEST)
}

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub product_id: i32,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
}

/// Cart page display data.
#[derive(Debug, Clone, Default)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub total: String,
}

impl CartView {
    /// Build the cart view, resolving product names and prices from the catalog.
    ///
    /// Lines whose product is no longer listed keep a placeholder name and
    /// are left out of the total. Amounts too large to represent show as "-".
    fn new(cart: &Cart, products: &HashMap<ProductId, (String, Price)>) -> Self {
        let mut total = Some(Price::ZERO);

        let lines = cart
            .items
            .iter()
            .map(|item| match products.get(&item.product_id) {
                Some((name, price)) => {
                    let line_total = price.checked_times(item.quantity);
                    total = total
                        .zip(line_total)
                        .and_then(|(total, line)| total.checked_add(line));
                    CartLineView {
                        product_id: item.product_id.as_i32(),
                        name: name.clone(),
                        quantity: item.quantity,
                        price: price.to_string(),
                        line_total: display_or_dash(line_total),
                    }
                }
                None => CartLineView {
                    product_id: item.product_id.as_i32(),
                    name: format!("Product #{}", item.product_id),
                    quantity: item.quantity,
                    price: "-".to_string(),
                    line_total: "-".to_string(),
                },
            })
            .collect();

        Self {
            lines,
            item_count: cart.total_quantity(),
            total: display_or_dash(total),
        }
    }
}

fn display_or_dash(price: Option<Price>) -> String {
    price.map_or_else(|| "-".to_string(), |price| price.to_string())
}

// =============================================================================
// Form and Query Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
}

/// Cart page query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct CartQuery {
    pub ordered: Option<OrderId>,
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub nav: Navigation,
    pub nonce: String,
    pub error: Option<&'static str>,
    pub cart: CartView,
    pub ordered: Option<OrderId>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Blocking alert fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/alert.html")]
pub struct AlertTemplate {
    pub message: &'static str,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart page.
#[instrument(skip(state, session, nonce))]
pub async fn show(
    State(state): State<AppState>,
    mut session: SessionStore,
    CspNonce(nonce): CspNonce,
    Query(query): Query<CartQuery>,
) -> Response {
    let nav = Navigation::load(&state, &mut session).await;
    if !nav.is_authenticated() {
        return Redirect::to("/auth/login").into_response();
    }

    let cart = match state.backend().get_cart(&session).await {
        Ok(cart) => cart,
        Err(BackendError::Http { status, .. }) if status == StatusCode::NOT_FOUND => Cart::default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch cart");
            Cart::default()
        }
    };

    let products = if cart.items.is_empty() {
        HashMap::new()
    } else {
        match state
            .backend()
            .list_products(&session, &ProductQuery::default())
            .await
        {
            Ok(products) => products
                .into_iter()
                .map(|p| (p.id, (p.name, p.price)))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve cart product names");
                HashMap::new()
            }
        }
    };

    CartShowTemplate {
        nav,
        nonce,
        error: query.error.as_deref().map(super::error_message),
        cart: CartView::new(&cart, &products),
        ordered: query.ordered,
    }
    .into_response()
}

/// Add one unit of a product to the cart.
///
/// Without a token the visitor is sent to the login page. On success HTMX
/// requests get the new count badge plus a `cart-updated` trigger and plain
/// posts are redirected back to the catalog. Failures raise a blocking alert.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(session): RequireUser,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let htmx = is_htmx(&headers);

    if let Err(e) = state
        .backend()
        .add_to_cart(&session, form.product_id, 1)
        .await
    {
        tracing::warn!(error = %e, product_id = %form.product_id, "Failed to add item to cart");
        return if htmx {
            (
                StatusCode::BAD_GATEWAY,
                AlertTemplate {
                    message: super::error_message("cart"),
                },
            )
                .into_response()
        } else {
            Redirect::to("/?error=cart").into_response()
        };
    }

    if !htmx {
        return Redirect::to("/").into_response();
    }

    let count = cart_count(state.backend(), &session).await;
    (
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartCountTemplate { count },
    )
        .into_response()
}

/// Cart count badge fragment.
#[instrument(skip_all)]
pub async fn count(State(state): State<AppState>, session: SessionStore) -> CartCountTemplate {
    CartCountTemplate {
        count: cart_count(state.backend(), &session).await,
    }
}

/// Place an order for everything in the cart.
#[instrument(skip_all)]
pub async fn checkout(State(state): State<AppState>, RequireUser(session): RequireUser) -> Redirect {
    match state.backend().create_order(&session).await {
        Ok(order) => {
            tracing::info!(order_id = %order.id, "Order placed");
            Redirect::to(&format!("/cart?ordered={}", order.id))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to place order");
            Redirect::to("/cart?error=order")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::backend::CartItem;

    #[test]
    fn test_is_htmx() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert(HX_REQUEST, HeaderValue::from_static("true"));
        assert!(is_htmx(&headers));
    }

    #[test]
    fn test_cart_view_resolves_names_and_totals() {
        let cart = Cart {
            id: None,
            items: vec![
                CartItem {
                    id: None,
                    product_id: ProductId::new(1),
                    quantity: 2,
                },
                CartItem {
                    id: None,
                    product_id: ProductId::new(99),
                    quantity: 1,
                },
            ],
        };
        let products = HashMap::from([(
            ProductId::new(1),
            ("Espresso".to_string(), Price::from_minor(15000)),
        )]);

        let view = CartView::new(&cart, &products);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.lines[0].name, "Espresso");
        assert_eq!(view.lines[0].line_total, "300 ₽");
        assert_eq!(view.lines[1].name, "Product #99");
        assert_eq!(view.total, "300 ₽");
    }

    #[test]
    fn test_cart_view_with_overflowing_amounts_shows_dash() {
        let cart = Cart {
            id: None,
            items: vec![
                CartItem {
                    id: None,
                    product_id: ProductId::new(1),
                    quantity: 1_000_000_000,
                },
                CartItem {
                    id: None,
                    product_id: ProductId::new(2),
                    quantity: 1,
                },
            ],
        };
        let products = HashMap::from([
            (
                ProductId::new(1),
                ("Gold bean".to_string(), serde_json::from_str("1e20").unwrap()),
            ),
            (
                ProductId::new(2),
                ("Espresso".to_string(), Price::from_minor(15000)),
            ),
        ]);

        let view = CartView::new(&cart, &products);
        assert_eq!(view.lines[0].line_total, "-");
        assert_eq!(view.lines[1].line_total, "150 ₽");
        assert_eq!(view.total, "-");
        assert_eq!(view.item_count, 1_000_000_001);
    }
}
