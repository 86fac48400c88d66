//! Roles carried in the bearer token payload.

use serde::{Deserialize, Serialize};

/// Role decoded from a session token.
///
/// Advisory only: it drives which pages the client offers, while the remote
/// API enforces the actual permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Store administrator with catalog and metrics access.
    Admin,
    /// Regular customer.
    #[default]
    User,
}

impl Role {
    /// Map a raw role claim. Anything other than `admin` is a customer.
    #[must_use]
    pub fn from_claim(raw: &str) -> Self {
        if raw == "admin" { Self::Admin } else { Self::User }
    }

    /// Whether this role may open the admin dashboard.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}
