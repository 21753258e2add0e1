//! CSRF protection, ownership checks and response headers.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;

use marvo_integration_tests::TestContext;

#[tokio::test]
async fn test_post_without_csrf_token_is_forbidden() {
    let ctx = TestContext::new().await;
    let product = ctx.create_product("Oxford Shirt", "250.00", 5).await;
    let browser = ctx.browser();
    let id = product.to_string();

    let resp = browser
        .client
        .post(browser.url("/add_to_cart"))
        .form(&[("product_id", id.as_str()), ("quantity", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = browser
        .client
        .post(browser.url("/add_to_cart"))
        .form(&[
            ("csrf_token", "not-the-token"),
            ("product_id", id.as_str()),
            ("quantity", "1"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(lines, 0);
}

#[tokio::test]
async fn test_other_users_order_is_not_found() {
    let ctx = TestContext::new().await;
    let product = ctx.create_product("Oxford Shirt", "250.00", 5).await;

    let alice = ctx.browser();
    alice.register("alice", "alice@example.com", "").await;
    alice.add_to_cart(product, 1).await;
    alice
        .post_form(
            "/checkout",
            &[("shipping_address", "12 Mabini St"), ("phone", "09171234567")],
        )
        .await;
    let number = ctx.latest_order_number().await.unwrap();

    let mallory = ctx.browser();
    mallory.register("mallory", "mallory@example.com", "").await;
    let resp = mallory.get(&format!("/order_tracking/{number}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = mallory.get("/order_tracking/MRV2026010100000000").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cannot_remove_another_carts_line() {
    let ctx = TestContext::new().await;
    let product = ctx.create_product("Oxford Shirt", "250.00", 5).await;

    let owner = ctx.browser();
    owner.add_to_cart(product, 1).await;
    let line_id: i32 = sqlx::query_scalar("SELECT id FROM cart_items")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();

    let stranger = ctx.browser();
    let resp = stranger
        .post_form(&format!("/remove_from_cart/{line_id}"), &[])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(lines, 1);

    owner
        .post_form(&format!("/remove_from_cart/{line_id}"), &[])
        .await;
    let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(lines, 0);
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;
    let browser = ctx.browser();

    assert_eq!(browser.get_text("/health").await, "ok");
    assert_eq!(browser.get("/health/ready").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_pages_carry_security_headers() {
    let ctx = TestContext::new().await;
    let resp = ctx.browser().get("/").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let ctx = TestContext::new().await;
    let resp = ctx.browser().get("/product/9999").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
