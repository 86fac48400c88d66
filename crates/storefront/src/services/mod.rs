//! Storefront services.
//!
//! # Services
//!
//! - `auth` - Login, registration and logout
//! - `catalog` - Product listing and admin product management
//! - `cart` - Cart mirror with optimistic quantity updates
//! - `metrics` - Admin dashboard metrics with fallback aggregation
//! - `checkout` - Card payment through the hosted payment service
//! - `profile` - Profile loading and avatar upload

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod metrics;
pub mod profile;
