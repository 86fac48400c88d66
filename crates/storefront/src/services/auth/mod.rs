//! Authentication service.
//!
//! Login and registration talk to the public endpoints; the issued token is
//! persisted in the client's [`TokenStore`](crate::token::TokenStore).

mod error;

pub use error::{AuthError, UNKNOWN_ERROR_MESSAGE};

use mangaverse_core::{Claims, Email};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::ApiClient;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::guard::Session;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    senha: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    nome: &'a str,
    email: &'a str,
    senha: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Authentication service.
#[derive(Debug, Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Log in with email and password and store the issued token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` before any request when the email is
    /// malformed, `AuthError::Api` when the API refuses the credentials, and
    /// `AuthError::MissingToken`/`AuthError::Claims` when the response has no
    /// usable token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Session, AuthError> {
        let email = Email::parse(email)?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::MissingPassword);
        }

        let response: LoginResponse = self
            .api
            .post(
                "/login",
                &LoginRequest {
                    email: email.as_str(),
                    senha: password.expose_secret(),
                },
            )
            .await?;

        let token = response
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthError::MissingToken)?;
        let claims = Claims::decode(&token)?;
        let token = SecretString::from(token);
        self.api.tokens().save(&token)?;

        set_sentry_user(
            claims.user_id.as_ref().map(mangaverse_core::UserId::as_str),
            claims.name.as_deref(),
        );
        add_breadcrumb("auth", "Logged in", None);
        info!(role = %claims.role, "Logged in");

        Ok(Session::new(token, claims))
    }

    /// Create an account. The user still has to log in afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingName`/`AuthError::InvalidEmail` before any
    /// request, and `AuthError::Api` when the API refuses the registration.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<(), AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        let email = Email::parse(email)?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::MissingPassword);
        }

        self.api
            .post_unit(
                "/register",
                &RegisterRequest {
                    nome: name,
                    email: email.as_str(),
                    senha: password.expose_secret(),
                },
            )
            .await?;

        add_breadcrumb("auth", "Registered", None);
        info!("Account registered");
        Ok(())
    }

    /// Forget the stored token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if the token cannot be removed.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.api.tokens().clear()?;
        clear_sentry_user();
        add_breadcrumb("auth", "Logged out", None);
        info!("Logged out");
        Ok(())
    }
}
