//! Authentication error types.

use thiserror::Error;

use crate::error::ApiError;
use crate::token::TokenStoreError;

/// Message used when nothing more specific is known.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Errors that can occur during login, registration and logout.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] mangaverse_core::EmailError),

    /// Registration without a name.
    #[error("name is required")]
    MissingName,

    /// Password left blank.
    #[error("password is required")]
    MissingPassword,

    /// The API refused the request or could not be reached.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The login response carried no token.
    #[error("login response did not include a token")]
    MissingToken,

    /// The issued token could not be decoded.
    #[error("issued token is unreadable: {0}")]
    Claims(#[from] mangaverse_core::ClaimsError),

    /// The token could not be stored or removed.
    #[error("token storage failed: {0}")]
    Store(#[from] TokenStoreError),
}

impl AuthError {
    /// Text to show on the login or register form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(e) => format!("Invalid email: {e}"),
            Self::MissingName => "Enter your name.".to_string(),
            Self::MissingPassword => "Enter your password.".to_string(),
            // Credential failures on login/register are plain server errors
            // with a `mensagem`.
            Self::Api(e) => e.user_message(UNKNOWN_ERROR_MESSAGE),
            Self::MissingToken | Self::Claims(_) | Self::Store(_) => UNKNOWN_ERROR_MESSAGE.to_string(),
        }
    }
}
