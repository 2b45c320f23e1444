//! Navigation bar state rendered at the top of every page.
//!
//! Every page render resolves the visitor from their token and, for signed-in
//! visitors, fetches a fresh cart to show the item count. Nothing is cached
//! between requests.

use tracing::instrument;

use crate::backend::{BackendClient, BackendError, User};
use crate::error::set_sentry_user;
use crate::session::SessionStore;
use crate::state::AppState;

/// The signed-in visitor as the navigation bar shows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavUser {
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for NavUser {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            is_admin: user.is_admin(),
        }
    }
}

/// Navigation bar contents.
///
/// Anonymous visitors get login and register links; signed-in visitors get a
/// greeting, a logout action, the cart count and, for admins, a link to the
/// admin console.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    pub user: Option<NavUser>,
    pub cart_count: u32,
}

impl Navigation {
    /// Resolve the visitor and build the navigation bar.
    ///
    /// A failed identity fetch clears the visitor's token (see
    /// [`BackendClient::current_user`]) and renders the anonymous variant.
    #[instrument(skip_all)]
    pub async fn load(state: &AppState, session: &mut SessionStore) -> Self {
        let user = state.backend().current_user(session).await;
        Self::for_user(state.backend(), session, user.as_ref()).await
    }

    /// Build the navigation bar for an already resolved visitor.
    pub async fn for_user(
        backend: &BackendClient,
        session: &SessionStore,
        user: Option<&User>,
    ) -> Self {
        let Some(user) = user else {
            return Self::default();
        };

        set_sentry_user(&user.id, &user.username);

        Self {
            user: Some(NavUser::from(user)),
            cart_count: cart_count(backend, session).await,
        }
    }

    /// Whether a visitor is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Whether the admin console link is shown.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.is_admin)
    }
}

/// Total number of units in the visitor's cart.
///
/// Returns 0 without a request when no token is held, and 0 when the cart
/// cannot be fetched (including the backend's 404 for a never-used cart).
pub async fn cart_count(backend: &BackendClient, session: &SessionStore) -> u32 {
    if !session.is_authenticated() {
        return 0;
    }

    match backend.get_cart(session).await {
        Ok(cart) => cart.total_quantity(),
        Err(BackendError::Http { status, .. }) if status == reqwest::StatusCode::NOT_FOUND => 0,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch cart for item count");
            0
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;
    use tower_sessions::{MemoryStore, Session};

    use super::*;
    use crate::config::StorefrontConfig;

    async fn state_for(router: Router) -> AppState {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        AppState::new(StorefrontConfig::for_backend(&format!("http://{addr}/api/v1")).unwrap())
    }

    async fn session_with(token: Option<&str>) -> SessionStore {
        let mut store =
            SessionStore::load(Session::new(None, Arc::new(MemoryStore::default()), None)).await;
        if let Some(token) = token {
            store.set_token(token).await;
        }
        store
    }

    #[tokio::test]
    async fn test_anonymous_navigation() {
        let state = state_for(Router::new()).await;
        let mut session = session_with(None).await;

        let nav = Navigation::load(&state, &mut session).await;
        assert_eq!(nav, Navigation::default());
        assert!(!nav.is_authenticated());
    }

    #[tokio::test]
    async fn test_signed_in_navigation_sums_cart_quantities() {
        let router = Router::new()
            .route(
                "/api/v1/auth/me",
                get(|| async { Json(json!({"id": 1, "username": "ann", "role": "user"})) }),
            )
            .route(
                "/api/v1/cart",
                get(|| async {
                    Json(json!({"id": 1, "items": [
                        {"product_id": 1, "quantity": 2},
                        {"product_id": 2, "quantity": 1}
                    ]}))
                }),
            );
        let state = state_for(router).await;
        let mut session = session_with(Some("tok")).await;

        let nav = Navigation::load(&state, &mut session).await;
        assert_eq!(nav.user.as_ref().unwrap().username, "ann");
        assert!(!nav.is_admin());
        assert_eq!(nav.cart_count, 3);
    }

    #[tokio::test]
    async fn test_failed_cart_fetch_shows_zero() {
        let router = Router::new()
            .route(
                "/api/v1/auth/me",
                get(|| async { Json(json!({"id": 1, "username": "root", "role": "admin"})) }),
            )
            .route(
                "/api/v1/cart",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            );
        let state = state_for(router).await;
        let mut session = session_with(Some("tok")).await;

        let nav = Navigation::load(&state, &mut session).await;
        assert!(nav.is_admin());
        assert_eq!(nav.cart_count, 0);
    }

    #[tokio::test]
    async fn test_rejected_token_is_cleared() {
        let router = Router::new().route(
            "/api/v1/auth/me",
            get(|| async { StatusCode::UNAUTHORIZED }),
        );
        let state = state_for(router).await;
        let mut session = session_with(Some("expired")).await;

        let nav = Navigation::load(&state, &mut session).await;
        assert!(!nav.is_authenticated());
        assert!(!session.is_authenticated());
    }
}
