//! Authentication route handlers.
//!
//! Login and registration forms post here; the backend does the actual
//! authentication. Failures redirect back to the form with an `?error=` code
//! so the banner survives a reload without re-posting.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::Redirect,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use crate::backend::NewUser;
use crate::error::clear_sentry_user;
use crate::filters;
use crate::middleware::CspNonce;
use crate::navigation::Navigation;
use crate::session::SessionStore;
use crate::state::AppState;

use super::MessageQuery;

/// Minimum password length, counted in characters.
pub const MIN_PASSWORD_CHARS: usize = 6;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

/// Why a registration form was rejected before reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordProblem {
    Mismatch,
    TooShort,
}

impl PasswordProblem {
    /// The `?error=` code for this problem.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Mismatch => "password_mismatch",
            Self::TooShort => "password_too_short",
        }
    }
}

impl RegisterForm {
    /// Local password checks, in order: confirmation first, then length.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn check_password(&self) -> Result<(), PasswordProblem> {
        let password = self.password.expose_secret();

        if password != self.confirm_password.expose_secret() {
            return Err(PasswordProblem::Mismatch);
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(PasswordProblem::TooShort);
        }
        Ok(())
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub nav: Navigation,
    pub nonce: String,
    pub error: Option<&'static str>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub nav: Navigation,
    pub nonce: String,
    pub error: Option<&'static str>,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip(state, session, nonce))]
pub async fn login_page(
    State(state): State<AppState>,
    mut session: SessionStore,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> LoginTemplate {
    LoginTemplate {
        nav: Navigation::load(&state, &mut session).await,
        nonce,
        error: query.error_message(),
    }
}

/// Handle login form submission.
///
/// On success the token is persisted in the session and the visitor goes
/// home. Any failure shows the same generic banner.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    mut session: SessionStore,
    Form(form): Form<LoginForm>,
) -> Redirect {
    match state
        .backend()
        .login(&mut session, form.email.trim(), &form.password)
        .await
    {
        Ok(_) => Redirect::to("/"),
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            Redirect::to("/auth/login?error=credentials")
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(state, session, nonce))]
pub async fn register_page(
    State(state): State<AppState>,
    mut session: SessionStore,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> RegisterTemplate {
    RegisterTemplate {
        nav: Navigation::load(&state, &mut session).await,
        nonce,
        error: query.error_message(),
    }
}

/// Handle registration form submission.
///
/// Password problems are caught locally without calling the backend.
/// Otherwise the account is created and then signed in with the same
/// credentials, strictly in that order.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    mut session: SessionStore,
    Form(form): Form<RegisterForm>,
) -> Redirect {
    if let Err(problem) = form.check_password() {
        return Redirect::to(&format!("/auth/register?error={}", problem.code()));
    }

    let email = form.email.trim();
    let new_user = NewUser {
        username: form.username.trim().to_string(),
        email: email.to_string(),
        password: form.password.expose_secret().to_string(),
    };

    if let Err(e) = state.backend().register(&session, &new_user).await {
        tracing::warn!(error = %e, "Registration failed");
        return Redirect::to("/auth/register?error=registration_failed");
    }

    match state
        .backend()
        .login(&mut session, email, &form.password)
        .await
    {
        Ok(_) => Redirect::to("/"),
        Err(e) => {
            tracing::warn!(error = %e, "Login after registration failed");
            Redirect::to("/auth/register?error=registration_failed")
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
///
/// Clears the token and goes home.
#[instrument(skip_all)]
pub async fn logout(mut session: SessionStore) -> Redirect {
    session.clear_token().await;
    clear_sentry_user();
    Redirect::to("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: "ann".to_string(),
            email: "ann@example.com".to_string(),
            password: SecretString::from(password),
            confirm_password: SecretString::from(confirm),
        }
    }

    #[test]
    fn test_mismatch_is_checked_before_length() {
        assert_eq!(form("abc", "abd").check_password(), Err(PasswordProblem::Mismatch));
    }

    #[test]
    fn test_short_password() {
        assert_eq!(form("abcde", "abcde").check_password(), Err(PasswordProblem::TooShort));
        assert_eq!(form("abcdef", "abcdef").check_password(), Ok(()));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Five Cyrillic letters are ten bytes but still too short.
        assert_eq!(form("кофея", "кофея").check_password(), Err(PasswordProblem::TooShort));
        assert_eq!(form("капучино", "капучино").check_password(), Ok(()));
    }

    #[test]
    fn test_problem_codes() {
        assert_eq!(PasswordProblem::Mismatch.code(), "password_mismatch");
        assert_eq!(PasswordProblem::TooShort.code(), "password_too_short");
    }
}
