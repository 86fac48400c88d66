//! MangaVerse storefront client library.
//!
//! This crate talks to the MangaVerse shop API on behalf of a front end: it
//! guards pages by session, lists products, mirrors the cart, aggregates
//! admin metrics and bridges checkout to the payment service.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod payments;
pub mod services;
pub mod state;
pub mod token;

pub use api::ApiClient;
pub use config::StorefrontConfig;
pub use error::ApiError;
pub use guard::{GuardRejection, Session, SessionGuard};
pub use navigation::{Navigation, Route};
pub use state::AppState;
