//! Integration test harness for the Coffeehouse storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p coffeehouse-integration-tests
//! ```
//!
//! Nothing external is needed: every test starts a [`FakeBackend`] (an
//! in-process stand-in for the REST backend that records each request it
//! receives) and the real storefront router on ephemeral ports, then drives
//! the storefront over HTTP with a cookie-carrying client.
//!
//! # Seed Data
//!
//! | User | Email | Password | Role |
//! |---|---|---|---|
//! | 1 | `admin@example.com` | `adminpass` | admin |
//! | 2 | `ann@example.com` | `hunter22` | user |
//!
//! Products 42 (Cappuccino) and 7 (Espresso), categories 1 (Coffee) and 2 (Tea).

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Form, Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use coffeehouse_storefront::{config::StorefrontConfig, state::AppState};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "adminpass";
pub const CUSTOMER_EMAIL: &str = "ann@example.com";
pub const CUSTOMER_PASSWORD: &str = "hunter22";

// =============================================================================
// Fake backend
// =============================================================================

/// A request received by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
struct FakeUser {
    id: i32,
    username: String,
    email: String,
    password: String,
    role: String,
}

impl FakeUser {
    fn token(&self) -> String {
        format!("token-{}", self.id)
    }

    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "role": self.role,
            "is_active": true,
            "is_verified": true,
            "created_at": "2024-03-20T12:00:00"
        })
    }
}

#[derive(Debug, Default)]
struct FakeState {
    users: Vec<FakeUser>,
    products: Vec<Value>,
    categories: Vec<Value>,
    /// Cart lines per user id; absent until the first add.
    carts: HashMap<i32, Vec<(i32, u32)>>,
    orders: Vec<Value>,
    requests: Vec<RecordedRequest>,
    /// Paths under `/api/v1` that answer 500 regardless of method.
    failing: HashSet<String>,
}

impl FakeState {
    fn seeded() -> Self {
        Self {
            users: vec![
                FakeUser {
                    id: 1,
                    username: "admin".to_string(),
                    email: ADMIN_EMAIL.to_string(),
                    password: ADMIN_PASSWORD.to_string(),
                    role: "admin".to_string(),
                },
                FakeUser {
                    id: 2,
                    username: "ann".to_string(),
                    email: CUSTOMER_EMAIL.to_string(),
                    password: CUSTOMER_PASSWORD.to_string(),
                    role: "user".to_string(),
                },
            ],
            products: vec![
                json!({"id": 42, "name": "Cappuccino", "price": 250.0, "description": "Milk foam",
                       "category_id": 1, "category_name": "Coffee", "image_url": null}),
                json!({"id": 7, "name": "Espresso", "price": 150.0, "description": "Short and strong",
                       "category_id": 1, "category_name": "Coffee", "image_url": "/img/espresso.jpg"}),
            ],
            categories: vec![
                json!({"id": 1, "name": "Coffee", "description": "Hot coffee drinks"}),
                json!({"id": 2, "name": "Tea", "description": null}),
            ],
            ..Self::default()
        }
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<FakeUser> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        self.users.iter().find(|user| user.token() == token).cloned()
    }
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"detail": message}))).into_response()
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Not authenticated")
}

/// An in-process stand-in for the Coffeehouse REST backend.
///
/// Serves the `/api/v1` surface the storefront uses, backed by seeded
/// in-memory data, and records every request it receives.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Shared,
}

impl FakeBackend {
    /// Start the fake backend on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::seeded()));

        let api = Router::new()
            .route("/auth/authentication", post(login))
            .route("/auth/registration", post(register))
            .route("/auth/me", get(me))
            .route("/auth/users", get(list_users))
            .route("/auth/user/{id}/role", patch(update_role))
            .route("/products/products", get(list_products))
            .route(
                "/products/product/{id}",
                get(get_product).put(update_product).delete(delete_product),
            )
            .route("/categories/categories", get(list_categories))
            .route(
                "/categories/category/{id}",
                axum::routing::delete(delete_category),
            )
            .route("/cart", get(get_cart).post(add_to_cart))
            .route("/orders/order", post(create_order))
            .route("/orders/orders", get(list_orders))
            .route("/orders/order/{id}", patch(update_order_status));

        let router = Router::new()
            .nest("/api/v1", api)
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Fake backend stopped");
        });

        Self { addr, state }
    }

    /// Base URL of the fake API (`http://127.0.0.1:<port>/api/v1`).
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Paths of requests received so far, as `"METHOD /path"`.
    #[must_use]
    pub fn request_log(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }

    /// Make every request to `path` (relative to `/api/v1`, such as
    /// `/products/products`) fail with a 500.
    pub fn fail_path(&self, path: &str) {
        lock(&self.state).failing.insert(format!("/api/v1{path}"));
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        lock(&self.state).requests.clear();
    }

    /// Total quantity in a user's cart, or `None` if they have no cart.
    #[must_use]
    pub fn cart_quantity(&self, user_id: i32) -> Option<u32> {
        lock(&self.state)
            .carts
            .get(&user_id)
            .map(|lines| lines.iter().map(|(_, quantity)| quantity).sum())
    }

    /// Role of a user, if they exist.
    #[must_use]
    pub fn role_of(&self, user_id: i32) -> Option<String> {
        lock(&self.state)
            .users
            .iter()
            .find(|user| user.id == user_id)
            .map(|user| user.role.clone())
    }

    /// Whether a product still exists.
    #[must_use]
    pub fn has_product(&self, product_id: i32) -> bool {
        lock(&self.state)
            .products
            .iter()
            .any(|p| p["id"] == product_id)
    }

    /// A product as the backend stores it.
    #[must_use]
    pub fn product(&self, product_id: i32) -> Option<Value> {
        lock(&self.state)
            .products
            .iter()
            .find(|p| p["id"] == product_id)
            .cloned()
    }

    /// Whether a category still exists.
    #[must_use]
    pub fn has_category(&self, category_id: i32) -> bool {
        lock(&self.state)
            .categories
            .iter()
            .any(|c| c["id"] == category_id)
    }

    /// Status of an order, if it exists.
    #[must_use]
    pub fn order_status(&self, order_id: i32) -> Option<String> {
        lock(&self.state)
            .orders
            .iter()
            .find(|o| o["id"] == order_id)
            .and_then(|o| o["status"].as_str().map(String::from))
    }
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        authorization: request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };
    let fails = {
        let mut state = lock(&state);
        let fails = state.failing.contains(&recorded.path);
        state.requests.push(recorded);
        fails
    };
    if fails {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }
    next.run(request).await
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(State(state): State<Shared>, Form(form): Form<LoginForm>) -> Response {
    let state = lock(&state);
    match state
        .users
        .iter()
        .find(|u| u.email == form.username && u.password == form.password)
    {
        Some(user) => Json(json!({"access_token": user.token(), "token_type": "bearer"}))
            .into_response(),
        None => detail(StatusCode::UNAUTHORIZED, "Incorrect email or password"),
    }
}

#[derive(Deserialize)]
struct Registration {
    username: String,
    email: String,
    password: String,
}

async fn register(State(state): State<Shared>, Json(body): Json<Registration>) -> Response {
    let mut state = lock(&state);
    if state.users.iter().any(|u| u.email == body.email) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    let user = FakeUser {
        id: state.users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
        username: body.username,
        email: body.email,
        password: body.password,
        role: "user".to_string(),
    };
    let payload = user.to_json();
    state.users.push(user);
    (StatusCode::CREATED, Json(payload)).into_response()
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match lock(&state).user_for(&headers) {
        Some(user) => Json(user.to_json()).into_response(),
        None => unauthorized(),
    }
}

/// The caller if they are an admin, else the error response to send.
fn require_admin(state: &FakeState, headers: &HeaderMap) -> Result<FakeUser, Response> {
    match state.user_for(headers) {
        Some(user) if user.role == "admin" => Ok(user),
        Some(_) => Err(detail(StatusCode::FORBIDDEN, "Not enough permissions")),
        None => Err(unauthorized()),
    }
}

async fn list_users(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    Json(state.users.iter().map(FakeUser::to_json).collect::<Vec<_>>()).into_response()
}

#[derive(Deserialize)]
struct RoleBody {
    role: String,
}

async fn update_role(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(body): Json<RoleBody>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.users.iter_mut().find(|u| u.id == id) {
        Some(user) => {
            user.role = body.role;
            Json(user.to_json()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "User not found"),
    }
}

#[derive(Deserialize)]
struct ProductFilters {
    search: Option<String>,
    category_id: Option<i32>,
    sort_by: Option<String>,
}

async fn list_products(
    State(state): State<Shared>,
    Query(filters): Query<ProductFilters>,
) -> Json<Vec<Value>> {
    let state = lock(&state);
    let mut products: Vec<Value> = state
        .products
        .iter()
        .filter(|p| filters.category_id.is_none_or(|id| p["category_id"] == id))
        .filter(|p| {
            filters.search.as_deref().is_none_or(|needle| {
                p["name"]
                    .as_str()
                    .is_some_and(|name| name.to_lowercase().contains(&needle.to_lowercase()))
            })
        })
        .cloned()
        .collect();

    match filters.sort_by.as_deref() {
        Some("name") => products.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str())),
        Some("price") => products.sort_by(|a, b| {
            a["price"]
                .as_f64()
                .partial_cmp(&b["price"].as_f64())
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        _ => {}
    }

    Json(products)
}

async fn get_product(State(state): State<Shared>, Path(id): Path<i32>) -> Response {
    match lock(&state).products.iter().find(|p| p["id"] == id) {
        Some(product) => Json(product.clone()).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Product not found"),
    }
}

async fn update_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    if !body["category_id"].is_i64() {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "category_id must be an integer");
    }
    let Some(product) = state.products.iter_mut().find(|p| p["id"] == id) else {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    };
    if let (Some(product), Some(body)) = (product.as_object_mut(), body.as_object()) {
        for (key, value) in body {
            product.insert(key.clone(), value.clone());
        }
    }
    Json(product.clone()).into_response()
}

async fn delete_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    let before = state.products.len();
    state.products.retain(|p| p["id"] != id);
    if state.products.len() == before {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    }
    Json(json!({"message": "Product deleted"})).into_response()
}

async fn list_categories(State(state): State<Shared>) -> Json<Vec<Value>> {
    Json(lock(&state).categories.clone())
}

async fn delete_category(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    let before = state.categories.len();
    state.categories.retain(|c| c["id"] != id);
    if state.categories.len() == before {
        return detail(StatusCode::NOT_FOUND, "Category not found");
    }
    Json(json!({"message": "Category deleted"})).into_response()
}

fn cart_json(user_id: i32, lines: &[(i32, u32)]) -> Value {
    json!({
        "id": user_id,
        "items": lines
            .iter()
            .enumerate()
            .map(|(i, (product_id, quantity))| json!({
                "id": i + 1,
                "product_id": product_id,
                "quantity": quantity
            }))
            .collect::<Vec<_>>()
    })
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    match state.carts.get(&user.id) {
        Some(lines) => Json(cart_json(user.id, lines)).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Cart not found"),
    }
}

#[derive(Deserialize)]
struct CartItemBody {
    product_id: i32,
    quantity: u32,
}

async fn add_to_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CartItemBody>,
) -> Response {
    let mut state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    if !state.products.iter().any(|p| p["id"] == body.product_id) {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    }

    let lines = state.carts.entry(user.id).or_default();
    match lines.iter_mut().find(|(id, _)| *id == body.product_id) {
        Some((_, quantity)) => *quantity += body.quantity,
        None => lines.push((body.product_id, body.quantity)),
    }
    Json(json!({"message": "Item added to cart"})).into_response()
}

async fn create_order(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    let lines = state.carts.remove(&user.id).unwrap_or_default();
    if lines.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "Cart is empty");
    }

    let price_of = |product_id: i32| {
        state
            .products
            .iter()
            .find(|p| p["id"] == product_id)
            .and_then(|p| p["price"].as_f64())
            .unwrap_or(0.0)
    };
    let id = i32::try_from(state.orders.len()).unwrap_or(0) + 1;
    let items: Vec<Value> = lines
        .iter()
        .enumerate()
        .map(|(i, (product_id, quantity))| {
            json!({"id": i + 1, "product_id": product_id, "quantity": quantity, "price": price_of(*product_id)})
        })
        .collect();
    let total: f64 = lines
        .iter()
        .map(|(product_id, quantity)| price_of(*product_id) * f64::from(*quantity))
        .sum();

    let order = json!({
        "id": id,
        "user_id": user.id,
        "status": "pending",
        "total_amount": total,
        "created_at": "2024-03-21T09:30:00",
        "items": items
    });
    state.orders.push(order.clone());
    (StatusCode::CREATED, Json(order)).into_response()
}

async fn list_orders(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let Some(user) = state.user_for(&headers) else {
        return unauthorized();
    };
    let orders: Vec<Value> = state
        .orders
        .iter()
        .filter(|o| user.role == "admin" || o["user_id"] == user.id)
        .cloned()
        .collect();
    Json(orders).into_response()
}

#[derive(Deserialize)]
struct StatusQuery {
    status: String,
}

async fn update_order_status(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.orders.iter_mut().find(|o| o["id"] == id) {
        Some(order) => {
            order["status"] = Value::String(query.status);
            Json(order.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Order not found"),
    }
}

// =============================================================================
// Test context
// =============================================================================

/// A running storefront wired to a fresh [`FakeBackend`].
pub struct TestContext {
    pub backend: FakeBackend,
    /// Client with a cookie store and redirects disabled.
    pub client: reqwest::Client,
    base_url: String,
}

impl TestContext {
    /// Start a fake backend and a storefront in front of it.
    ///
    /// # Panics
    ///
    /// Panics if either server cannot be started.
    pub async fn new() -> Self {
        let backend = FakeBackend::start().await;

        let config =
            StorefrontConfig::for_backend(&backend.url()).expect("Invalid fake backend URL");
        let app = coffeehouse_storefront::app(AppState::new(config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind storefront");
        let addr = listener.local_addr().expect("Storefront has no address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Storefront stopped");
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            backend,
            client,
            base_url: format!("http://{addr}"),
        }
    }

    /// Absolute storefront URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET path`.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed")
    }

    /// `POST path` with a form body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST failed")
    }

    /// Log in through the storefront's login form.
    ///
    /// # Panics
    ///
    /// Panics if the login does not redirect home.
    pub async fn login(&self, email: &str, password: &str) {
        let response = self
            .post_form("/auth/login", &[("email", email), ("password", password)])
            .await;
        assert_eq!(location(&response), Some("/"), "login did not succeed");
    }

    /// Log in as the seeded admin.
    pub async fn login_admin(&self) {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    }

    /// Log in as the seeded customer.
    pub async fn login_customer(&self) {
        self.login(CUSTOMER_EMAIL, CUSTOMER_PASSWORD).await;
    }
}

/// The `Location` header of a redirect response.
#[must_use]
pub fn location(response: &reqwest::Response) -> Option<&str> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
}
