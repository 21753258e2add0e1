//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                - Product listing (category, price, q filters)
//! GET  /product/{id}                    - Product detail with reviews
//! POST /product/{id}/review             - Post a review (auth)
//!
//! # Cart
//! POST /add_to_cart                     - Add or merge a cart line
//! GET  /cart                            - Cart page
//! POST /remove_from_cart/{id}           - Remove a line (owner-checked)
//!
//! # Auth
//! GET  /register                        - Register page (?ref= prefills a referral code)
//! POST /register                        - Register action
//! GET  /login                           - Login page
//! POST /login                           - Login action
//! GET  /logout                          - Logout (auth)
//!
//! # Account (requires auth)
//! GET  /profile                         - Orders, points balance and history
//! GET  /order_tracking/{order_number}   - One of the caller's orders
//! GET  /checkout                        - Checkout form
//! POST /checkout                        - Place the order
//!
//! # Comparison (requires auth)
//! GET  /compare                         - Comparison table
//! POST /compare/{product_id}            - Add a product
//! POST /compare/{product_id}/remove     - Remove a product
//!
//! # Admin (requires admin flag)
//! GET  /admin                           - Product list
//! GET  /admin/add_product               - Add product form
//! POST /admin/add_product               - Create product (multipart, optional image)
//! POST /admin/delete_product/{id}       - Delete product and its image
//! GET  /admin/orders                    - All orders (?status= filter)
//! POST /admin/orders/{number}/status    - Advance an order's status
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod compare;
pub mod home;
pub mod products;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::error::Result;
use crate::middleware::{Flash, push_flash};
use crate::state::AppState;

/// Queue a flash notice and redirect with 303 See Other.
async fn flash_redirect(session: &Session, flash: Flash, to: &str) -> Result<Redirect> {
    push_flash(session, flash).await?;
    Ok(Redirect::to(to))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::products))
        .route(
            "/add_product",
            get(admin::add_product_page).post(admin::add_product),
        )
        .route("/delete_product/{id}", post(admin::delete_product))
        .route("/orders", get(admin::orders))
        .route("/orders/{number}/status", post(admin::update_order_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/", get(home::home))
        .route("/product/{id}", get(products::show))
        .route("/product/{id}/review", post(products::review))
        // Cart
        .route("/add_to_cart", post(cart::add))
        .route("/cart", get(cart::show))
        .route("/remove_from_cart/{id}", post(cart::remove))
        // Auth
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        // Account
        .route("/profile", get(account::profile))
        .route("/order_tracking/{order_number}", get(account::order_tracking))
        .route("/checkout", get(checkout::checkout_page).post(checkout::place_order))
        // Comparison
        .route("/compare", get(compare::show))
        .route("/compare/{product_id}", post(compare::add))
        .route("/compare/{product_id}/remove", post(compare::remove))
        // Admin
        .nest("/admin", admin_routes())
}
