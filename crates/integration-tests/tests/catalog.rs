//! Catalog page, health and response headers.

use coffeehouse_integration_tests::TestContext;
use reqwest::StatusCode;

#[tokio::test]
async fn test_home_lists_products_and_categories_in_backend_order() {
    let ctx = TestContext::new().await;

    let resp = ctx.get("/").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap_or_default();

    let cappuccino = body.find("Cappuccino").unwrap_or(usize::MAX);
    let espresso = body.find("Espresso").unwrap_or(0);
    assert!(cappuccino < espresso);

    assert!(body.contains("250 ₽"));
    assert!(body.contains("150 ₽"));
    assert!(body.contains("default-product.svg"));
    assert!(body.contains("Hot coffee drinks"));
    assert!(body.contains("href=\"/?category_id=2\""));
    assert!(body.contains("name=\"product_id\" value=\"42\""));

    // Anonymous visitors get login and register links.
    assert!(body.contains("href=\"/auth/login\""));
    assert!(body.contains("href=\"/auth/register\""));
}

#[tokio::test]
async fn test_filters_are_forwarded_to_backend() {
    let ctx = TestContext::new().await;

    let body = ctx
        .get("/?sort_by=price&search=")
        .await
        .text()
        .await
        .unwrap_or_default();
    let espresso = body.find("Espresso").unwrap_or(usize::MAX);
    let cappuccino = body.find("Cappuccino").unwrap_or(0);
    assert!(espresso < cappuccino);
    assert!(body.contains("<option value=\"price\" selected>"));

    let body = ctx
        .get("/?search=espr")
        .await
        .text()
        .await
        .unwrap_or_default();
    assert!(body.contains("Espresso"));
    assert!(!body.contains("product-title\">Cappuccino"));

    let body = ctx
        .get("/?category_id=2")
        .await
        .text()
        .await
        .unwrap_or_default();
    assert!(body.contains("No products found."));
}

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new().await;
    let resp = ctx.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap_or_default(), "ok");
}

#[tokio::test]
async fn test_security_headers() {
    let ctx = TestContext::new().await;
    let resp = ctx.get("/").await;
    let headers = resp.headers();

    assert_eq!(
        headers.get("x-frame-options").and_then(|v| v.to_str().ok()),
        Some("DENY")
    );
    assert!(headers.contains_key("x-request-id"));
    let csp = headers
        .get("content-security-policy")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(csp.contains("script-src 'self' 'nonce-"));
    assert!(csp.contains("img-src 'self' http://127.0.0.1:"));
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let ctx = TestContext::new().await;
    let resp = ctx.get("/static/images/default-product.svg").await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_failed_product_fetch_keeps_categories() {
    let ctx = TestContext::new().await;
    ctx.backend.fail_path("/products/products");

    let resp = ctx.get("/").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap_or_default();

    assert!(body.contains("No products found."));
    assert!(!body.contains("Cappuccino"));
    assert!(body.contains("href=\"/?category_id=1\""));
    assert!(body.contains("Hot coffee drinks"));
}

#[tokio::test]
async fn test_failed_category_fetch_keeps_products() {
    let ctx = TestContext::new().await;
    ctx.backend.fail_path("/categories/categories");

    let resp = ctx.get("/").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap_or_default();

    assert!(body.contains("Cappuccino"));
    assert!(body.contains("Espresso"));
    assert!(!body.contains("href=\"/?category_id=1\""));
}
