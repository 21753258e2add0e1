//! Domain models for the storefront.
//!
//! These types represent validated domain objects. Where the stored shape
//! differs from the domain shape (JSON option lists, joined columns) the
//! repository decodes into a `*Row` type first and converts.

pub mod cart;
pub mod order;
pub mod points;
pub mod product;
pub mod review;
pub mod session;
pub mod user;

pub use cart::{CartItem, CartLine};
pub use order::{NewOrder, NewOrderItem, Order, OrderDetail, OrderItem};
pub use points::PointsEntry;
pub use product::{NewProduct, Product, ProductFilter};
pub use review::Review;
pub use session::{CurrentUser, Identity, keys as session_keys};
pub use user::{NewUser, User};
