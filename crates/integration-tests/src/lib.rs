//! Integration tests for Marvo Store.
//!
//! Each test starts the full storefront router on an ephemeral port, backed
//! by a fresh `SQLite` file and upload directory in a temp dir, and drives
//! it over HTTP with `reqwest`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marvo-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth` - Registration, referral bonus, login and logout
//! - `cart_checkout` - Cart, checkout, stock and points
//! - `admin` - Admin access, product upload and deletion, order status
//! - `security` - CSRF rejection and order ownership

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;

use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode, header};
use sqlx::SqlitePool;
use tempfile::TempDir;

use marvo_core::{Category, Price, ProductId};
use marvo_storefront::config::StorefrontConfig;
use marvo_storefront::db::{self, ProductRepository};
use marvo_storefront::models::NewProduct;
use marvo_storefront::state::AppState;

/// A running storefront with its own database.
pub struct TestContext {
    pub base_url: String,
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestContext {
    /// Start a storefront on `127.0.0.1:0`.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr: SocketAddr = listener.local_addr().expect("local addr");

        let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let upload_dir = dir.path().join("uploads").display().to_string();
        let base_url = format!("http://{addr}");

        let config = StorefrontConfig::from_lookup(|key| match key {
            "MARVO_DATABASE_URL" => Some(database_url.clone()),
            "MARVO_UPLOAD_DIR" => Some(upload_dir.clone()),
            "MARVO_PORT" => Some(addr.port().to_string()),
            "MARVO_BASE_URL" => Some(base_url.clone()),
            _ => None,
        })
        .expect("test config");

        let pool = db::create_pool(&config.database_url)
            .await
            .expect("create pool");
        db::migrate(&pool).await.expect("migrate");

        let app = marvo_storefront::build_app(AppState::new(config, pool.clone()))
            .await
            .expect("build app");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            base_url,
            pool,
            _dir: dir,
        }
    }

    /// A fresh browser with its own cookie jar.
    #[must_use]
    pub fn browser(&self) -> Browser {
        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .expect("http client");
        Browser {
            client,
            base_url: self.base_url.clone(),
        }
    }

    /// Insert a product directly.
    pub async fn create_product(&self, name: &str, price: &str, stock: i64) -> ProductId {
        let product = NewProduct {
            name: name.to_owned(),
            description: format!("{name} for testing"),
            price: Price::parse(price).unwrap(),
            image_url: None,
            category: Category::Shirts,
            sizes: vec!["M".to_owned()],
            colors: vec!["Blue".to_owned()],
            stock,
        };
        let mut conn = self.pool.acquire().await.unwrap();
        ProductRepository::new(&mut conn)
            .create(&product)
            .await
            .unwrap()
            .id
    }

    pub async fn make_admin(&self, email: &str) {
        sqlx::query("UPDATE users SET is_admin = 1 WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn stock_of(&self, id: ProductId) -> i64 {
        sqlx::query_scalar("SELECT stock FROM products WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn points_of(&self, username: &str) -> i64 {
        sqlx::query_scalar("SELECT points FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn referral_code_of(&self, username: &str) -> String {
        sqlx::query_scalar("SELECT referral_code FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn latest_order_number(&self) -> Option<String> {
        sqlx::query_scalar("SELECT order_number FROM orders ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .unwrap()
    }
}

/// One client session against the test server.
pub struct Browser {
    pub client: Client,
    base_url: String,
}

impl Browser {
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn get_text(&self, path: &str) -> String {
        let resp = self.get(path).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
        resp.text().await.unwrap()
    }

    /// The CSRF token embedded in the page at `path`.
    pub async fn csrf_token(&self, path: &str) -> String {
        let html = self.get_text(path).await;
        scrape_csrf_token(&html).expect("page has a csrf token")
    }

    /// Submit a form with a valid CSRF token taken from the login page.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Response {
        let token = self.csrf_token("/login").await;
        let mut form: Vec<(&str, &str)> = vec![("csrf_token", token.as_str())];
        form.extend_from_slice(fields);
        self.client
            .post(self.url(path))
            .form(&form)
            .send()
            .await
            .unwrap()
    }

    /// Register with a default password and address.
    pub async fn register(&self, username: &str, email: &str, referral_code: &str) -> Response {
        self.post_form(
            "/register",
            &[
                ("username", username),
                ("email", email),
                ("password", "correct-horse"),
                ("confirm_password", "correct-horse"),
                ("full_name", "Test Shopper"),
                ("phone", "09171234567"),
                ("address", "12 Mabini St"),
                ("city", "Quezon City"),
                ("region", "NCR"),
                ("referral_code", referral_code),
            ],
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post_form("/login", &[("email", email), ("password", password)])
            .await
    }

    pub async fn add_to_cart(&self, product: ProductId, quantity: i64) -> Response {
        let product = product.to_string();
        let quantity = quantity.to_string();
        self.post_form(
            "/add_to_cart",
            &[
                ("product_id", product.as_str()),
                ("quantity", quantity.as_str()),
                ("size", "M"),
                ("color", "Blue"),
            ],
        )
        .await
    }
}

/// Extract the value of the first hidden `csrf_token` input.
#[must_use]
pub fn scrape_csrf_token(html: &str) -> Option<String> {
    const MARKER: &str = r#"name="csrf_token" value=""#;
    let start = html.find(MARKER)? + MARKER.len();
    let rest = html.get(start..)?;
    let end = rest.find('"')?;
    rest.get(..end).map(str::to_owned)
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(resp: &Response) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_csrf_token() {
        let html = r#"<form><input type="hidden" name="csrf_token" value="abc_DEF-123"></form>"#;
        assert_eq!(scrape_csrf_token(html).as_deref(), Some("abc_DEF-123"));
        assert_eq!(scrape_csrf_token("<p>none</p>"), None);
    }
}
