//! MangaVerse Core - Shared domain types and pure logic.
//!
//! This crate provides the types used across all MangaVerse components:
//! - `storefront` - Client library for the remote shop API
//! - `cli` - Terminal front end (`mv-cli`)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no token storage. Everything here can be unit tested without a
//! runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, and roles
//! - [`product`] - Catalog products and admin drafts
//! - [`cart`] - Cart mirror, wire normalization, and totals
//! - [`metrics`] - Admin dashboard metrics and the client-side cart reduction
//! - [`claims`] - Advisory decoding of bearer token payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod claims;
pub mod metrics;
pub mod product;
pub mod types;

pub use cart::{Cart, CartItem, CartResponse, ProductSnapshot, WireCartItem};
pub use claims::{Claims, ClaimsError};
pub use metrics::{CartRecord, CartRecordItem, MetricsSnapshot, RANKING_LIMIT, RankedProduct};
pub use product::{Product, ProductDraft, ProductDraftError};
pub use types::*;
