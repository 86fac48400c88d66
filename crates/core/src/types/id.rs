//! Newtype IDs for type-safe entity references.
//!
//! The remote API identifies records with opaque strings (document ids), so
//! every id wraps a `String`. Use the `define_id!` macro to create wrappers
//! that prevent accidentally mixing ids from different entity types.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use mangaverse_core::define_id;
/// define_id!(ReviewId);
/// define_id!(AuthorId);
///
/// let review = ReviewId::new("65f1c0de");
/// assert_eq!(review.as_str(), "65f1c0de");
///
/// // These are different types, so this won't compile:
/// // let _: AuthorId = review;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(CartId);
define_id!(CartItemId);
define_id!(UserId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_transparent_strings() {
        let id = ProductId::new("65f1c0de9a");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"65f1c0de9a\"");

        let parsed: CartItemId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(parsed.as_str(), "abc");
        assert_eq!(parsed.to_string(), "abc");
    }

    #[test]
    fn test_conversions() {
        let from_str: UserId = "u1".into();
        let from_string: UserId = String::from("u1").into();
        assert_eq!(from_str, from_string);
        assert_eq!(from_str.into_inner(), "u1");
    }
}
