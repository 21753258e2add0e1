//! Core types for Marvo Store.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod codes;
pub mod email;
pub mod id;
pub mod price;
pub mod status;
pub mod username;

pub use codes::{CodeError, OrderNumber, ReferralCode};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError, format_amount};
pub use status::*;
pub use username::{Username, UsernameError};
