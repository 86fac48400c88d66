//! Route guards based on the stored session token.
//!
//! The token payload is decoded without checking its signature. The role it
//! carries only decides which pages to offer; the API authorizes every call
//! on its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mangaverse_core::{Claims, Role};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::navigation::{Navigation, Route};
use crate::token::TokenStore;

/// Message shown on the home page when a customer opens an admin page.
pub const ADMIN_ONLY_MESSAGE: &str = "Access restricted to administrators.";

/// Login prompt shown when `route` needs a session.
#[must_use]
pub const fn login_message(route: Route) -> &'static str {
    match route {
        Route::Cart => "Log in to access your cart.",
        Route::Admin => "Log in as an administrator to access the dashboard.",
        Route::Profile => "Log in to access your profile.",
        Route::Checkout => "Log in to finish your purchase.",
        Route::Home | Route::Login | Route::Dashboard | Route::Error => "Log in to continue.",
    }
}

/// A decoded, unexpired token.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    claims: Claims,
}

impl Session {
    #[must_use]
    pub const fn new(token: SecretString, claims: Claims) -> Self {
        Self { token, claims }
    }

    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }

    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.claims
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.claims.role
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.claims.role.is_admin()
    }

    /// The `nome` claim, if the token has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.claims.name.as_deref()
    }

    /// The `nome` claim, or `default` when absent.
    #[must_use]
    pub fn display_name<'a>(&'a self, default: &'a str) -> &'a str {
        self.name().unwrap_or(default)
    }
}

/// Why a guard refused to let the user through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardRejection {
    /// No usable session: go log in, then come back.
    RedirectToLogin(Navigation),
    /// Signed in, but not as an administrator.
    Forbidden(Navigation),
}

impl GuardRejection {
    #[must_use]
    pub const fn navigation(&self) -> &Navigation {
        match self {
            Self::RedirectToLogin(nav) | Self::Forbidden(nav) => nav,
        }
    }
}

impl std::fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nav = self.navigation();
        match &nav.message {
            Some(message) => f.write_str(message),
            None => f.write_str(nav.route.path()),
        }
    }
}

impl std::error::Error for GuardRejection {}

/// Checks the stored token before protected pages load.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    tokens: Arc<dyn TokenStore>,
}

impl SessionGuard {
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self { tokens }
    }

    /// The current session, if the stored token decodes and has not expired.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current_at(Utc::now())
    }

    /// [`SessionGuard::current`] evaluated at `now`.
    #[must_use]
    pub fn current_at(&self, now: DateTime<Utc>) -> Option<Session> {
        let token = self.tokens.load()?;
        let claims = match Claims::decode(token.expose_secret()) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Stored token could not be decoded");
                return None;
            }
        };
        if claims.is_expired(now) {
            debug!("Stored token has expired");
            return None;
        }
        Some(Session::new(token, claims))
    }

    /// Let any signed-in user through to `route`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardRejection::RedirectToLogin`] when there is no usable
    /// session.
    pub fn require_user(&self, route: Route) -> Result<Session, GuardRejection> {
        self.require_user_at(route, Utc::now())
    }

    /// [`SessionGuard::require_user`] evaluated at `now`.
    ///
    /// # Errors
    ///
    /// See [`SessionGuard::require_user`].
    pub fn require_user_at(&self, route: Route, now: DateTime<Utc>) -> Result<Session, GuardRejection> {
        self.current_at(now).ok_or_else(|| {
            GuardRejection::RedirectToLogin(
                Navigation::to(Route::Login)
                    .with_message(login_message(route))
                    .with_redirect(route.path()),
            )
        })
    }

    /// Let only administrators through to `route`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardRejection::RedirectToLogin`] without a session and
    /// [`GuardRejection::Forbidden`] for a non-admin session.
    pub fn require_admin(&self, route: Route) -> Result<Session, GuardRejection> {
        self.require_admin_at(route, Utc::now())
    }

    /// [`SessionGuard::require_admin`] evaluated at `now`.
    ///
    /// # Errors
    ///
    /// See [`SessionGuard::require_admin`].
    pub fn require_admin_at(&self, route: Route, now: DateTime<Utc>) -> Result<Session, GuardRejection> {
        let session = self.require_user_at(route, now)?;
        if !session.is_admin() {
            return Err(GuardRejection::Forbidden(
                Navigation::to(Route::Home).with_message(ADMIN_ONLY_MESSAGE),
            ));
        }
        Ok(session)
    }
}
