//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (signed cookies, `SQLite` store)
//! 5. Security headers (CSP, frame and referrer policy)
//!
//! Authentication, admin checks, CSRF and page context are extractors
//! rather than layers, so each handler states what it needs.

pub mod auth;
pub mod csrf;
pub mod flash;
pub mod page;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    CurrentIdentity, RequireAdmin, RequireAuth, clear_current_user, set_current_user,
};
pub use csrf::{CsrfForm, CsrfOnly, CsrfProtected, verify_csrf};
pub use flash::{Flash, FlashLevel, push_flash};
pub use page::PageContext;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{cart_token, create_session_layer, create_session_store, ensure_cart_token};
