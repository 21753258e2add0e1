//! Marvo Core - Shared domain types.
//!
//! This crate provides the types used across all Marvo Store components:
//! - `storefront` - The public shop, checkout and admin panel
//! - `cli` - Command-line tools for migrations, admin grants and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP. Database encoding is available behind the `sqlite`
//! feature so the types can be bound and decoded directly by `sqlx`.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, usernames,
//!   order numbers, referral codes and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
