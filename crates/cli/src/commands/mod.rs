//! CLI commands.
//!
//! Each command runs the same guard its web page would before touching the
//! API, and reports failures through [`CliError`].

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod profile;

use mangaverse_storefront::ApiError;
use mangaverse_storefront::guard::GuardRejection;
use mangaverse_storefront::navigation::Navigation;
use mangaverse_storefront::services::auth::AuthError;
use mangaverse_storefront::services::cart::CartError;
use mangaverse_storefront::services::catalog::CatalogError;
use mangaverse_storefront::services::checkout::CheckoutError;
use mangaverse_storefront::services::metrics::MetricsError;
use mangaverse_storefront::services::profile::ProfileError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Guard(#[from] GuardRejection),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("{0}")]
    Input(String),
}

impl CliError {
    /// Text to show the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Guard(rejection) => rejection.to_string(),
            Self::Auth(e) => e.user_message(),
            Self::Catalog(e) => e.user_message(mangaverse_storefront::services::catalog::LOAD_FAILED_MESSAGE),
            Self::Cart(e) => e.user_message(),
            Self::Checkout(e) => e.user_message(),
            Self::Metrics(e) => e.user_message(),
            Self::Profile(e) => e.user_message(),
            Self::Input(message) => message.clone(),
        }
    }

    fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Auth(AuthError::Api(e))
            | Self::Catalog(CatalogError::Api(e))
            | Self::Checkout(CheckoutError::CreatePayment(e))
            | Self::Metrics(MetricsError::Api(e))
            | Self::Profile(ProfileError::Api(e)) => Some(e),
            Self::Cart(e) => e.api_error(),
            _ => None,
        }
    }

    /// Page the web front end would move to after this error.
    pub fn navigation(&self) -> Option<Navigation> {
        match self {
            Self::Guard(rejection) => Some(rejection.navigation().clone()),
            _ => self.api_error().and_then(ApiError::navigation),
        }
    }

    /// Send server-side faults to Sentry.
    pub fn report(&self) {
        if let Some(e) = self.api_error() {
            e.report();
        }
    }
}
