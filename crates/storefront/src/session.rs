//! Per-visitor bearer token storage.
//!
//! The backend authenticates requests with a bearer token obtained at login.
//! The storefront keeps exactly one token per visitor in the visitor's
//! server-side session and hands a [`SessionStore`] to every component that
//! needs to make authenticated backend calls.

use axum::{extract::FromRequestParts, http::request::Parts};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tower_sessions::Session;

use crate::error::AppError;

/// Session key under which the bearer token is stored.
pub const TOKEN_KEY: &str = "token";

/// The visitor's bearer token, backed by their session.
///
/// The token is read from the session once, when the store is extracted, and
/// held in memory for the rest of the request. Writes go to both places.
pub struct SessionStore {
    session: Session,
    token: Option<SecretString>,
}

impl SessionStore {
    /// Load the token held by `session`, if any.
    pub async fn load(session: Session) -> Self {
        let token = match session.get::<String>(TOKEN_KEY).await {
            Ok(token) => token.map(SecretString::from),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read token from session");
                None
            }
        };

        Self { session, token }
    }

    /// The token currently held, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Whether a token is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Persist `token` in the session and hold it in memory.
    pub async fn set_token(&mut self, token: &str) {
        if let Err(e) = self.session.insert(TOKEN_KEY, token).await {
            tracing::error!(error = %e, "Failed to persist token in session");
        }
        self.token = Some(SecretString::from(token));
    }

    /// Remove the token from the session and from memory.
    pub async fn clear_token(&mut self) {
        self.token = None;
        if let Err(e) = self.session.remove::<String>(TOKEN_KEY).await {
            tracing::error!(error = %e, "Failed to remove token from session");
        }
    }

    /// Headers for a backend request.
    ///
    /// Always carries a JSON content type; carries a bearer authorization
    /// header only when a token is held.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            match HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Stored token is not a valid header value; sending anonymously"),
            }
        }

        headers
    }
}

impl<S> FromRequestParts<S> for SessionStore
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))?;

        Ok(Self::load(session).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn new_session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_headers_without_token_are_anonymous() {
        let store = SessionStore::load(new_session()).await;
        let headers = store.headers();

        assert!(!store.is_authenticated());
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_set_token_persists_and_authorizes() {
        let session = new_session();
        let mut store = SessionStore::load(session.clone()).await;
        store.set_token("abc.def").await;

        assert_eq!(store.headers().get(AUTHORIZATION).unwrap(), "Bearer abc.def");

        // A fresh store over the same session sees the persisted token.
        let reloaded = SessionStore::load(session).await;
        assert_eq!(reloaded.token().unwrap().expose_secret(), "abc.def");
    }

    #[tokio::test]
    async fn test_clear_token_removes_both() {
        let session = new_session();
        let mut store = SessionStore::load(session.clone()).await;
        store.set_token("abc.def").await;
        store.clear_token().await;

        assert!(store.token().is_none());
        assert!(store.headers().get(AUTHORIZATION).is_none());
        assert!(SessionStore::load(session).await.token().is_none());
    }

    #[tokio::test]
    async fn test_authorization_header_is_sensitive() {
        let mut store = SessionStore::load(new_session()).await;
        store.set_token("secret-token").await;
        assert!(store.headers().get(AUTHORIZATION).unwrap().is_sensitive());
    }
}
