//! Coffeehouse REST backend client.
//!
//! # Architecture
//!
//! - The backend is the source of truth - NO local cache, every call goes out
//! - One method per backend endpoint, all relative to a fixed base URL
//! - Credentials come from the visitor's [`SessionStore`], never from ambient state
//! - No retries, no timeouts, no batching
//!
//! # Example
//!
//! ```rust,ignore
//! use coffeehouse_storefront::backend::BackendClient;
//!
//! let client = BackendClient::new(config.backend_url.clone());
//!
//! client.login(&mut session, "ann@example.com", "hunter22").await?;
//! let cart = client.add_to_cart(&session, ProductId::new(42), 1).await?;
//! ```

pub mod types;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use coffeehouse_core::{CategoryId, OrderId, OrderStatus, ProductId, Role, UserId};

use crate::session::SessionStore;

pub use types::*;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a response (connection refused, DNS, ...).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {}", detail.as_deref().unwrap_or("(no detail)"))]
    Http {
        /// Response status.
        status: StatusCode,
        /// The backend's `detail` message, if any.
        detail: Option<String>,
        /// The parsed error payload (`Null` when the body was not JSON).
        body: serde_json::Value,
    },

    /// A success response whose body did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// An endpoint path could not be joined onto the base URL.
    #[error("Invalid endpoint path: {0}")]
    InvalidPath(#[from] url::ParseError),
}

impl BackendError {
    /// HTTP status of the failure, if the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected our credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }
}

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the Coffeehouse REST backend.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a new client for the backend rooted at `base_url`.
    ///
    /// `base_url` should end in `/` (see `StorefrontConfig`), so that
    /// `auth/me` resolves to `<base>/auth/me`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// The backend base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Start a request to `path` (relative to the base URL) with the
    /// session's headers attached.
    fn request(
        &self,
        method: Method,
        path: &str,
        session: &SessionStore,
    ) -> Result<RequestBuilder, BackendError> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        Ok(self
            .client
            .request(method, url)
            .headers(session.headers()))
    }

    /// Send a request and decode its JSON body.
    ///
    /// Non-success statuses become [`BackendError::Http`] carrying the
    /// parsed error payload.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let body: serde_json::Value =
                serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
            let detail = serde_json::from_value::<ErrorBody>(body.clone())
                .ok()
                .and_then(|error| error.detail_text());

            tracing::debug!(
                status = %status,
                detail = ?detail,
                "Backend returned non-success status"
            );

            return Err(BackendError::Http {
                status,
                detail,
                body,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %String::from_utf8_lossy(&bytes).chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Decode(e)
        })
    }

    /// Send a JSON body and decode the JSON response.
    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        session: &SessionStore,
        body: &B,
    ) -> Result<T, BackendError> {
        let request = self.request(method, path, session)?.json(body);
        self.send(request).await
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Exchange credentials for a bearer token.
    ///
    /// The login endpoint takes a form-encoded body with the email in the
    /// `username` field. On success the token is stored in `session`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 401 for bad credentials.
    #[instrument(skip(self, session, password))]
    pub async fn login(
        &self,
        session: &mut SessionStore,
        email: &str,
        password: &SecretString,
    ) -> Result<TokenResponse, BackendError> {
        let url = self.base_url.join("auth/authentication")?;
        let request = self.client.post(url).form(&[
            ("username", email),
            ("password", password.expose_secret()),
        ]);

        let token: TokenResponse = self.send(request).await?;
        session.set_token(&token.access_token).await;
        Ok(token)
    }

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 400 if the email is taken.
    #[instrument(skip(self, session, user), fields(username = %user.username))]
    pub async fn register(
        &self,
        session: &SessionStore,
        user: &NewUser,
    ) -> Result<User, BackendError> {
        self.send_json(Method::POST, "auth/registration", session, user)
            .await
    }

    /// Fetch the user the session's token belongs to.
    ///
    /// Returns `None` without a request when no token is held. Any failure
    /// (network or status) is treated as "not authenticated": the token is
    /// cleared and `None` is returned.
    #[instrument(skip_all)]
    pub async fn current_user(&self, session: &mut SessionStore) -> Option<User> {
        if !session.is_authenticated() {
            return None;
        }

        let result = match self.request(Method::GET, "auth/me", session) {
            Ok(request) => self.send::<User>(request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::info!(error = %e, "Identity fetch failed, clearing session token");
                session.clear_token().await;
                None
            }
        }
    }

    /// List every user (admin only).
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 403 for non-admins.
    #[instrument(skip_all)]
    pub async fn list_users(&self, session: &SessionStore) -> Result<Vec<User>, BackendError> {
        let request = self.request(Method::GET, "auth/users", session)?;
        self.send(request).await
    }

    /// Change a user's role (admin only).
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 403 for non-admins or 404 for
    /// unknown users.
    #[instrument(skip(self, session))]
    pub async fn update_user_role(
        &self,
        session: &SessionStore,
        user_id: UserId,
        role: Role,
    ) -> Result<User, BackendError> {
        self.send_json(
            Method::PATCH,
            &format!("auth/user/{user_id}/role"),
            session,
            &RoleUpdate { role },
        )
        .await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List products, filtered and sorted by the backend.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self, session))]
    pub async fn list_products(
        &self,
        session: &SessionStore,
        query: &ProductQuery,
    ) -> Result<Vec<Product>, BackendError> {
        let request = self
            .request(Method::GET, "products/products", session)?
            .query(query);
        self.send(request).await
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 404 for unknown products.
    #[instrument(skip(self, session))]
    pub async fn get_product(
        &self,
        session: &SessionStore,
        product_id: ProductId,
    ) -> Result<Product, BackendError> {
        let request = self.request(Method::GET, &format!("products/product/{product_id}"), session)?;
        self.send(request).await
    }

    /// Replace a product's fields (admin only).
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 403 for non-admins.
    #[instrument(skip(self, session, product))]
    pub async fn update_product(
        &self,
        session: &SessionStore,
        product_id: ProductId,
        product: &ProductInput,
    ) -> Result<Product, BackendError> {
        self.send_json(
            Method::PUT,
            &format!("products/product/{product_id}"),
            session,
            product,
        )
        .await
    }

    /// Delete a product (admin only).
    ///
    /// Returns the backend's confirmation payload.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 403 for non-admins.
    #[instrument(skip(self, session))]
    pub async fn delete_product(
        &self,
        session: &SessionStore,
        product_id: ProductId,
    ) -> Result<serde_json::Value, BackendError> {
        let request =
            self.request(Method::DELETE, &format!("products/product/{product_id}"), session)?;
        self.send(request).await
    }

    /// List categories in backend order.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip_all)]
    pub async fn list_categories(
        &self,
        session: &SessionStore,
    ) -> Result<Vec<Category>, BackendError> {
        let request = self.request(Method::GET, "categories/categories", session)?;
        self.send(request).await
    }

    /// Delete a category (admin only).
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 403 for non-admins.
    #[instrument(skip(self, session))]
    pub async fn delete_category(
        &self,
        session: &SessionStore,
        category_id: CategoryId,
    ) -> Result<serde_json::Value, BackendError> {
        let request = self.request(
            Method::DELETE,
            &format!("categories/category/{category_id}"),
            session,
        )?;
        self.send(request).await
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Fetch the session user's cart.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 401 without a valid token, or
    /// 404 when the user has never added anything.
    #[instrument(skip_all)]
    pub async fn get_cart(&self, session: &SessionStore) -> Result<Cart, BackendError> {
        let request = self.request(Method::GET, "cart", session)?;
        self.send(request).await
    }

    /// Add `quantity` units of a product to the session user's cart.
    ///
    /// Returns the backend's confirmation payload.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 404 for unknown products.
    #[instrument(skip(self, session))]
    pub async fn add_to_cart(
        &self,
        session: &SessionStore,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<serde_json::Value, BackendError> {
        self.send_json(
            Method::POST,
            "cart",
            session,
            &CartItemInput {
                product_id,
                quantity,
            },
        )
        .await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Turn the session user's cart into an order.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 400 when the cart is empty.
    #[instrument(skip_all)]
    pub async fn create_order(&self, session: &SessionStore) -> Result<Order, BackendError> {
        let request = self.request(Method::POST, "orders/order", session)?;
        self.send(request).await
    }

    /// List orders visible to the session user.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip_all)]
    pub async fn list_orders(&self, session: &SessionStore) -> Result<Vec<Order>, BackendError> {
        let request = self.request(Method::GET, "orders/orders", session)?;
        self.send(request).await
    }

    /// Move an order to a new status (admin only).
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` with status 403 for non-admins or 404 for
    /// unknown orders.
    #[instrument(skip(self, session))]
    pub async fn update_order_status(
        &self,
        session: &SessionStore,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, BackendError> {
        let request = self
            .request(Method::PATCH, &format!("orders/order/{order_id}"), session)?
            .query(&[("status", status.as_str())]);
        self.send(request).await
    }
}
