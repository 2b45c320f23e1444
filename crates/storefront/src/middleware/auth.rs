//! Authentication extractors.
//!
//! The storefront trusts nothing it has not just asked the backend: admin
//! access is re-checked against `GET /auth/me` on every request.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};

use crate::backend::User;
use crate::error::AppError;
use crate::session::SessionStore;
use crate::state::AppState;

/// Why an authenticated extractor rejected the request.
#[derive(Debug)]
pub enum AuthRejection {
    /// No token; send the visitor to the login page.
    RedirectToLogin,
    /// Signed out or not an admin; send the visitor to the home page.
    RedirectHome,
    /// The session could not be read.
    Internal(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::RedirectHome => Redirect::to("/").into_response(),
            Self::Internal(err) => err.into_response(),
        }
    }
}

/// Extractor that requires a held token.
///
/// Only checks that the visitor has signed in; the backend decides whether
/// the token is still good. Redirects to `/auth/login` otherwise.
pub struct RequireUser(pub SessionStore);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = SessionStore::from_request_parts(parts, state)
            .await
            .map_err(AuthRejection::Internal)?;

        if session.is_authenticated() {
            Ok(Self(session))
        } else {
            Err(AuthRejection::RedirectToLogin)
        }
    }
}

/// Extractor that requires an admin.
///
/// Resolves the visitor with the backend before the handler runs. A missing
/// token, a rejected token or a non-admin role redirects to `/` so no admin
/// content is ever rendered for them.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAdmin { user, session }: RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAdmin {
    pub user: User,
    pub session: SessionStore,
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let mut session = SessionStore::from_request_parts(parts, state)
            .await
            .map_err(AuthRejection::Internal)?;

        match state.backend().current_user(&mut session).await {
            Some(user) if user.is_admin() => Ok(Self { user, session }),
            Some(user) => {
                tracing::info!(user_id = %user.id, "Non-admin denied admin console");
                Err(AuthRejection::RedirectHome)
            }
            None => Err(AuthRejection::RedirectHome),
        }
    }
}
