//! Unified error handling for remote calls, with Sentry integration.
//!
//! Every failed API call ends up in one of two buckets: the server answered
//! with an error ([`ApiError::Server`], [`ApiError::Unauthorized`]) or nothing
//! answered at all ([`ApiError::Network`]). Components wrap `ApiError` in their
//! own error enums and turn it into a user-facing message with
//! [`ApiError::user_message`].

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::navigation::{Navigation, Route};

/// Message shown when a session is rejected by the API.
pub const SESSION_REJECTED_MESSAGE: &str = "Invalid token or insufficient permissions";

/// Message shown when the API cannot be reached.
pub const UNREACHABLE_MESSAGE: &str = "Server did not respond. Is the API running?";

/// Error talking to the shop API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server responded with a non-success status.
    #[error("Server responded with {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Server {
        status: StatusCode,
        /// The body's `mensagem`, when it had one.
        message: Option<String>,
    },

    /// 401/403 outside login/register. The stored token has been cleared.
    #[error("Session rejected with {status}")]
    Unauthorized { status: StatusCode },

    /// No response: connection refused, DNS failure, timeout.
    #[error("No response from server: {0}")]
    Network(#[source] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request was aborted because its owner shut down.
    #[error("Request cancelled")]
    Cancelled,

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Error body shape used by the API.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    mensagem: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    /// Pull a message out of a raw error body, if it is JSON and carries one.
    pub(crate) fn message_from(body: &str) -> Option<String> {
        serde_json::from_str::<Self>(body)
            .ok()
            .and_then(|b| b.mensagem.or(b.message))
            .filter(|m| !m.trim().is_empty())
    }
}

impl ApiError {
    /// The server's own message, when the server sent one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Text to show the user, using `fallback` when the server gave no
    /// message of its own.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Server { message, .. } => message.clone().unwrap_or_else(|| fallback.to_string()),
            Self::Unauthorized { .. } => SESSION_REJECTED_MESSAGE.to_string(),
            Self::Network(_) => UNREACHABLE_MESSAGE.to_string(),
            Self::Decode(_) | Self::Cancelled | Self::InvalidRequest(_) => fallback.to_string(),
        }
    }

    /// Where the front end should go after this error, if anywhere.
    ///
    /// Rejected sessions go back to login; an unreachable API shows the error
    /// page. Everything else stays on the current page.
    #[must_use]
    pub fn navigation(&self) -> Option<Navigation> {
        match self {
            Self::Unauthorized { .. } => {
                Some(Navigation::to(Route::Login).with_message(SESSION_REJECTED_MESSAGE))
            }
            Self::Network(_) => Some(Navigation::to(Route::Error).with_message(UNREACHABLE_MESSAGE)),
            _ => None,
        }
    }

    /// Whether retrying this call against another endpoint makes sense.
    ///
    /// A rejected session or a shutdown stops every fallback list.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::Cancelled)
    }

    /// Report to Sentry when this looks like a fault rather than a user
    /// mistake.
    pub fn report(&self) {
        let is_fault = match self {
            Self::Server { status, .. } => status.is_server_error(),
            Self::Decode(_) | Self::InvalidRequest(_) => true,
            Self::Unauthorized { .. } | Self::Network(_) | Self::Cancelled => false,
        };
        if is_fault {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API error"
            );
        }
    }
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Set the Sentry user context after a successful login.
pub fn set_sentry_user(user_id: Option<&str>, name: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: user_id.map(String::from),
            username: name.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Changed quantity", Some(&[("item_id", "65f1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
