//! Admin panel access, product management and order status.

#![allow(clippy::unwrap_used)]

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};

use marvo_integration_tests::{Browser, TestContext, location};

async fn admin_browser(ctx: &TestContext) -> Browser {
    let browser = ctx.browser();
    browser.register("owner", "owner@example.com", "").await;
    ctx.make_admin("owner@example.com").await;
    browser
}

fn png_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(4, 4))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn product_form(token: &str, name: &str) -> Form {
    Form::new()
        .text("csrf_token", token.to_owned())
        .text("name", name.to_owned())
        .text("description", "Soft cotton tee")
        .text("price", "499.00")
        .text("category", "shirts")
        .text("sizes", "S, M, L")
        .text("colors", "Black")
        .text("stock", "10")
}

async fn order_status(ctx: &TestContext, number: &str) -> String {
    sqlx::query_scalar("SELECT status FROM orders WHERE order_number = ?")
        .bind(number)
        .fetch_one(&ctx.pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_admin_requires_login_and_admin_flag() {
    let ctx = TestContext::new().await;

    let resp = ctx.browser().get("/admin").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let customer = ctx.browser();
    customer.register("alice", "alice@example.com", "").await;
    let resp = customer.get("/admin").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = customer.post_form("/admin/delete_product/1", &[]).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_add_product_with_image_then_delete() {
    let ctx = TestContext::new().await;
    let admin = admin_browser(&ctx).await;
    let token = admin.csrf_token("/admin/add_product").await;

    let form = product_form(&token, "Black Tee").part(
        "image",
        Part::bytes(png_bytes())
            .file_name("tee.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let resp = admin
        .client
        .post(admin.url("/admin/add_product"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin");

    let (id, image_url): (i32, Option<String>) =
        sqlx::query_as("SELECT id, image_url FROM products WHERE name = 'Black Tee'")
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    let filename = image_url.unwrap();
    assert!(filename.ends_with(".png"));
    assert_ne!(filename, "tee.png");

    let resp = admin.get(&format!("/uploads/{filename}")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let listing = admin.get_text("/admin").await;
    assert!(listing.contains("Black Tee"));

    let resp = admin
        .post_form(&format!("/admin/delete_product/{id}"), &[])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let resp = admin.get(&format!("/uploads/{filename}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_product_without_image() {
    let ctx = TestContext::new().await;
    let admin = admin_browser(&ctx).await;
    let token = admin.csrf_token("/admin/add_product").await;

    let resp = admin
        .client
        .post(admin.url("/admin/add_product"))
        .multipart(product_form(&token, "Plain Tee"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let image_url: Option<String> =
        sqlx::query_scalar("SELECT image_url FROM products WHERE name = 'Plain Tee'")
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert!(image_url.is_none());
}

#[tokio::test]
async fn test_add_product_rejects_fake_image() {
    let ctx = TestContext::new().await;
    let admin = admin_browser(&ctx).await;
    let token = admin.csrf_token("/admin/add_product").await;

    let form = product_form(&token, "Fake").part(
        "image",
        Part::bytes(b"definitely not a png".to_vec()).file_name("fake.png"),
    );
    let resp = admin
        .client
        .post(admin.url("/admin/add_product"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("invalid image"));
    assert!(body.contains("Soft cotton tee"));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_add_product_validation_errors() {
    let ctx = TestContext::new().await;
    let admin = admin_browser(&ctx).await;
    let token = admin.csrf_token("/admin/add_product").await;

    let form = Form::new()
        .text("csrf_token", token)
        .text("name", "")
        .text("description", "x")
        .text("price", "-5")
        .text("category", "hats")
        .text("stock", "ten");
    let resp = admin
        .client
        .post(admin.url("/admin/add_product"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Name is required"));
    assert!(body.contains("Price must be a number of zero or more"));
    assert!(body.contains("Choose a category"));
    assert!(body.contains("Stock must be a whole number"));
}

#[tokio::test]
async fn test_multipart_without_csrf_token_is_forbidden() {
    let ctx = TestContext::new().await;
    let admin = admin_browser(&ctx).await;

    let form = product_form("forged", "Forged Tee");
    let resp = admin
        .client
        .post(admin.url("/admin/add_product"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_order_status_follows_lifecycle() {
    let ctx = TestContext::new().await;
    let product = ctx.create_product("Oxford Shirt", "250.00", 5).await;

    let customer = ctx.browser();
    customer.register("alice", "alice@example.com", "").await;
    customer.add_to_cart(product, 1).await;
    customer
        .post_form(
            "/checkout",
            &[("shipping_address", "12 Mabini St"), ("phone", "09171234567")],
        )
        .await;
    let number = ctx.latest_order_number().await.unwrap();

    let admin = admin_browser(&ctx).await;
    let status_path = format!("/admin/orders/{number}/status");

    let resp = admin.post_form(&status_path, &[("status", "confirmed")]).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin/orders");
    assert_eq!(order_status(&ctx, &number).await, "confirmed");

    // Skipping straight to delivered is refused
    admin.post_form(&status_path, &[("status", "delivered")]).await;
    assert_eq!(order_status(&ctx, &number).await, "confirmed");

    admin.post_form(&status_path, &[("status", "bogus")]).await;
    assert_eq!(order_status(&ctx, &number).await, "confirmed");

    let listing = admin.get_text("/admin/orders?status=confirmed").await;
    assert!(listing.contains(&number));
    let listing = admin.get_text("/admin/orders?status=pending").await;
    assert!(!listing.contains(&number));

    let resp = admin
        .post_form("/admin/orders/MRV2026010100000000/status", &[("status", "confirmed")])
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
