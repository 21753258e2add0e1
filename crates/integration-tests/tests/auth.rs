//! Registration, referral and login flows.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;

use marvo_integration_tests::{TestContext, location};

#[tokio::test]
async fn test_register_logs_in_and_redirects_home() {
    let ctx = TestContext::new().await;
    let browser = ctx.browser();

    let resp = browser.register("alice", "alice@example.com", "").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    let profile = browser.get_text("/profile").await;
    assert!(profile.contains("alice"));
    assert!(profile.contains("0 points"));
}

#[tokio::test]
async fn test_referral_credits_referrer_fifty_points() {
    let ctx = TestContext::new().await;

    let resp = ctx.browser().register("alice", "alice@example.com", "").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let code = ctx.referral_code_of("alice").await;

    let resp = ctx.browser().register("bob", "bob@example.com", &code).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    assert_eq!(ctx.points_of("alice").await, 50);
    assert_eq!(ctx.points_of("bob").await, 0);
}

#[tokio::test]
async fn test_unknown_referral_code_is_ignored() {
    let ctx = TestContext::new().await;

    let resp = ctx.browser().register("carol", "carol@example.com", "NOSUCH99").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(ctx.points_of("carol").await, 0);
}

#[tokio::test]
async fn test_duplicate_email_rerenders_form() {
    let ctx = TestContext::new().await;
    ctx.browser().register("alice", "alice@example.com", "").await;

    let resp = ctx.browser().register("alice2", "alice@example.com", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("email is already registered"));
    assert!(!body.contains("correct-horse"));
}

#[tokio::test]
async fn test_login_with_wrong_password_shows_error() {
    let ctx = TestContext::new().await;
    ctx.browser().register("alice", "alice@example.com", "").await;

    let browser = ctx.browser();
    let resp = browser.login("alice@example.com", "wrong-password").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("invalid email or password"));

    let resp = browser.get("/profile").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_follows_safe_next_only() {
    let ctx = TestContext::new().await;
    ctx.browser().register("alice", "alice@example.com", "").await;

    let browser = ctx.browser();
    let resp = browser
        .post_form(
            "/login",
            &[
                ("email", "alice@example.com"),
                ("password", "correct-horse"),
                ("next", "/profile"),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/profile");

    let other = ctx.browser();
    let resp = other
        .post_form(
            "/login",
            &[
                ("email", "alice@example.com"),
                ("password", "correct-horse"),
                ("next", "//evil.example"),
            ],
        )
        .await;
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn test_protected_page_redirects_to_login_with_next() {
    let ctx = TestContext::new().await;

    let resp = ctx.browser().get("/profile").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?next=%2Fprofile");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let ctx = TestContext::new().await;
    let browser = ctx.browser();
    browser.register("alice", "alice@example.com", "").await;

    let resp = browser.get("/logout").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let resp = browser.get("/profile").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}
