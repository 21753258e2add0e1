//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration with referral redemption, password login
//! - `catalog` - Filtered listing and product pages
//! - `cart` - Session-token carts with stock checks
//! - `checkout` - Cart to order conversion
//! - `orders` - Order tracking and status lifecycle
//! - `points` - The loyalty ledger
//! - `reviews` - Product reviews
//! - `compare` - Comparison lists
//! - `products` - Admin product management
//! - `images` - Upload validation and storage
//!
//! Services borrow a `&mut SqliteConnection` from the caller, usually a
//! transaction opened by the route handler.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod compare;
pub mod images;
pub mod orders;
pub mod points;
pub mod products;
pub mod reviews;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use catalog::CatalogService;
pub use checkout::{CheckoutError, CheckoutService};
pub use compare::CompareService;
pub use images::{ImageError, ImageStore};
pub use orders::{OrderError, OrderService};
pub use products::ProductAdminService;
pub use reviews::{ReviewError, ReviewService};
