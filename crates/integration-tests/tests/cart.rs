//! Add-to-cart, count badge and checkout.

use coffeehouse_integration_tests::{TestContext, location};
use reqwest::StatusCode;

/// Post an add-to-cart form the way the page script does.
async fn htmx_add(ctx: &TestContext, product_id: &str) -> reqwest::Response {
    ctx.client
        .post(ctx.url("/cart/add"))
        .header("HX-Request", "true")
        .form(&[("product_id", product_id)])
        .send()
        .await
        .expect("POST failed")
}

#[tokio::test]
async fn test_add_without_token_redirects_to_login() {
    let ctx = TestContext::new().await;

    let resp = ctx.post_form("/cart/add", &[("product_id", "42")]).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/auth/login"));
    assert!(ctx.backend.requests().is_empty());
}

#[tokio::test]
async fn test_htmx_add_returns_summed_count() {
    let ctx = TestContext::new().await;
    ctx.login_customer().await;
    ctx.backend.clear_requests();

    let resp = htmx_add(&ctx, "42").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("hx-trigger").and_then(|v| v.to_str().ok()),
        Some("cart-updated")
    );
    let body = resp.text().await.unwrap_or_default();
    assert!(body.contains("<span id=\"cart-count\" class=\"cart-count\">1</span>"));

    // Add first, then a fresh cart fetch for the count.
    assert_eq!(
        ctx.backend.request_log(),
        ["POST /api/v1/cart", "GET /api/v1/cart"]
    );

    let body = htmx_add(&ctx, "42").await.text().await.unwrap_or_default();
    assert!(body.contains(">2</span>"));
    let body = htmx_add(&ctx, "7").await.text().await.unwrap_or_default();
    assert!(body.contains(">3</span>"));
    assert_eq!(ctx.backend.cart_quantity(2), Some(3));
}

#[tokio::test]
async fn test_plain_add_redirects_home_and_nav_shows_count() {
    let ctx = TestContext::new().await;
    ctx.login_customer().await;

    // Before any add the backend has no cart at all.
    let body = ctx.get("/").await.text().await.unwrap_or_default();
    assert!(body.contains("class=\"cart-count\">0</span>"));

    let resp = ctx.post_form("/cart/add", &[("product_id", "42")]).await;
    assert_eq!(location(&resp), Some("/"));

    let body = ctx.get("/").await.text().await.unwrap_or_default();
    assert!(body.contains("class=\"cart-count\">1</span>"));

    let body = ctx.get("/cart/count").await.text().await.unwrap_or_default();
    assert!(body.contains(">1</span>"));
}

#[tokio::test]
async fn test_add_failure_raises_alert() {
    let ctx = TestContext::new().await;
    ctx.login_customer().await;

    let resp = htmx_add(&ctx, "999").await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = resp.text().await.unwrap_or_default();
    assert!(body.contains("role=\"alert\""));
    assert!(!body.contains("Product not found"));

    let resp = ctx.post_form("/cart/add", &[("product_id", "999")]).await;
    assert_eq!(location(&resp), Some("/?error=cart"));

    let body = ctx.get("/?error=cart").await.text().await.unwrap_or_default();
    assert!(body.contains("Could not add the item to your cart"));
}

#[tokio::test]
async fn test_cart_count_is_zero_when_anonymous() {
    let ctx = TestContext::new().await;
    let body = ctx.get("/cart/count").await.text().await.unwrap_or_default();
    assert!(body.contains(">0</span>"));
    assert!(ctx.backend.requests().is_empty());
}

#[tokio::test]
async fn test_cart_page_and_checkout() {
    let ctx = TestContext::new().await;

    let resp = ctx.get("/cart").await;
    assert_eq!(location(&resp), Some("/auth/login"));

    ctx.login_customer().await;
    let body = ctx.get("/cart").await.text().await.unwrap_or_default();
    assert!(body.contains("Your cart is empty"));

    // Checking out an empty cart fails.
    let resp = ctx.post_form("/cart/checkout", &[]).await;
    assert_eq!(location(&resp), Some("/cart?error=order"));

    ctx.post_form("/cart/add", &[("product_id", "42")]).await;
    ctx.post_form("/cart/add", &[("product_id", "42")]).await;
    let body = ctx.get("/cart").await.text().await.unwrap_or_default();
    assert!(body.contains("<td>Cappuccino</td>"));
    assert!(body.contains("<td>500 ₽</td>"));

    let resp = ctx.post_form("/cart/checkout", &[]).await;
    assert_eq!(location(&resp), Some("/cart?ordered=1"));

    let body = ctx.get("/cart?ordered=1").await.text().await.unwrap_or_default();
    assert!(body.contains("Order #1 has been placed."));
    assert!(body.contains("Your cart is empty"));
}
