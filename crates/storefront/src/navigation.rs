//! Pages of the storefront and where to send the user next.
//!
//! Navigation targets are plain paths with an optional user-facing message
//! (`mensagem`) and an optional redirect-back path (`redirect`), both
//! percent-encoded the same way the web front end builds its links.

use std::fmt;

/// A page of the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Dashboard,
    Cart,
    Checkout,
    Profile,
    Admin,
    Error,
}

impl Route {
    /// Path of the page.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Dashboard => "/dashboard",
            Self::Cart => "/carrinho",
            Self::Checkout => "/finalizar-compra",
            Self::Profile => "/perfil",
            Self::Admin => "/adm",
            Self::Error => "/error",
        }
    }
}

/// Where the front end should go, and what it should tell the user there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    pub message: Option<String>,
    pub redirect: Option<String>,
}

impl Navigation {
    #[must_use]
    pub const fn to(route: Route) -> Self {
        Self {
            route,
            message: None,
            redirect: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Ask the target page to come back to `path` afterwards.
    #[must_use]
    pub fn with_redirect(mut self, path: impl Into<String>) -> Self {
        self.redirect = Some(path.into());
        self
    }

    /// Full location, e.g. `/login?mensagem=...&redirect=%2Fcarrinho`.
    #[must_use]
    pub fn location(&self) -> String {
        let mut query = Vec::new();
        if let Some(message) = &self.message {
            query.push(format!("mensagem={}", urlencoding::encode(message)));
        }
        if let Some(redirect) = &self.redirect {
            query.push(format!("redirect={}", urlencoding::encode(redirect)));
        }

        if query.is_empty() {
            self.route.path().to_string()
        } else {
            format!("{}?{}", self.route.path(), query.join("&"))
        }
    }
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location())
    }
}
