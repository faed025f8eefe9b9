//! Mock of the shop admin backend, used by the client's integration tests.
//!
//! Routes live under `/api` and follow the real backend's REST layout with
//! trailing slashes. Every route except the token endpoint and the health
//! check requires `Authorization: Bearer <token>` for a token issued by
//! `/api/accounts/token/`; failures answer `{"detail": ...}` like the real
//! backend does.

pub mod store;

use std::sync::Arc;

use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub use store::{
    Blog, BlogImage, Category, Faults, Order, Product, ProductImage, Store, Subscriber, User,
    SEED_PASSWORD, SEED_USERNAME,
};

pub type Db = Arc<RwLock<Store>>;

/// Router over the seeded store.
pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    let api = Router::new()
        .route("/health/", get(health))
        .route("/accounts/token/", post(issue_token))
        .route("/accounts/me/", get(me))
        .route("/admin/stats/", get(stats))
        .route("/admin/orders/", get(list_orders))
        .route("/admin/orders/{id}/", get(get_order).patch(update_order))
        .route("/catalog/admin/products/", get(list_products).post(create_product))
        .route(
            "/catalog/admin/products/{id}/",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route("/catalog/admin/products/{id}/upload-image/", post(upload_product_image))
        .route("/catalog/admin/images/{id}/delete/", delete(delete_product_image))
        .route("/catalog/admin/categories/", get(list_categories).post(create_category))
        .route(
            "/catalog/admin/categories/{id}/",
            get(get_category).patch(update_category).delete(delete_category),
        )
        .route("/blogs/admin/blogs/", get(list_blogs).post(create_blog))
        .route(
            "/blogs/admin/blogs/{id}/",
            get(get_blog).patch(update_blog).delete(delete_blog),
        )
        .route("/blogs/admin/blogs/{id}/upload-multi-image/", post(upload_blog_image))
        .route("/blogs/admin/blogs/{id}/upload-image/", post(upload_blog_featured_image))
        .route("/blogs/admin/blogs/{id}/upload-pdf/", post(upload_blog_pdf))
        .route("/newsletter/admin/subscribers/", get(list_subscribers))
        .route(
            "/newsletter/admin/subscribers/{id}/",
            patch(update_subscriber).delete(delete_subscriber),
        )
        .with_state(db);
    Router::new().nest("/api", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(store)).await
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Error response carrying a `{"detail": ...}` body.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    body: Value,
}

impl Failure {
    fn detail(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "detail": detail.into() }),
        }
    }

    fn not_found() -> Self {
        Self::detail(StatusCode::NOT_FOUND, "Not found.")
    }

    fn unauthorized(detail: &str) -> Self {
        Self::detail(StatusCode::UNAUTHORIZED, detail)
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::detail(StatusCode::BAD_REQUEST, detail)
    }

    fn field_required(field: &str) -> Self {
        let mut body = serde_json::Map::new();
        body.insert(field.to_string(), json!(["This field is required."]));
        Self {
            status: StatusCode::BAD_REQUEST,
            body: Value::Object(body),
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type Reply<T> = Result<T, Failure>;

/// Resolve the bearer token to a user.
fn authorize(store: &Store, headers: &HeaderMap) -> Reply<User> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Failure::unauthorized("Authentication credentials were not provided."))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| Failure::unauthorized("Authorization header must use Bearer."))?;
    store
        .sessions
        .get(token)
        .and_then(|username| store.users.get(username))
        .cloned()
        .ok_or_else(|| Failure::unauthorized("Given token not valid for any token type"))
}

/// Merge a JSON object into a record. `id` is never overwritten.
fn apply_patch<T: Serialize + DeserializeOwned>(record: &mut T, patch: Value) -> Reply<()> {
    let Value::Object(fields) = patch else {
        return Err(Failure::bad_request("Expected a JSON object."));
    };
    let mut current =
        serde_json::to_value(&*record).map_err(|e| Failure::bad_request(e.to_string()))?;
    if let Value::Object(target) = &mut current {
        for (key, value) in fields {
            if key != "id" {
                target.insert(key, value);
            }
        }
    }
    *record = serde_json::from_value(current).map_err(|e| Failure::bad_request(e.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

async fn health() -> &'static str {
    "ok"
}

async fn issue_token(State(db): State<Db>, Json(input): Json<Credentials>) -> Reply<Json<Value>> {
    let mut store = db.write().await;
    if store.passwords.get(&input.username) != Some(&input.password) {
        debug!(username = %input.username, "rejected credentials");
        return Err(Failure::unauthorized("invalid credentials"));
    }
    let access = format!("access-{}", Uuid::new_v4());
    let refresh = format!("refresh-{}", Uuid::new_v4());
    store.sessions.insert(access.clone(), input.username);
    Ok(Json(json!({ "access": access, "refresh": refresh })))
}

async fn me(State(db): State<Db>, headers: HeaderMap) -> Reply<Json<User>> {
    let store = db.read().await;
    authorize(&store, &headers).map(Json)
}

// ---------------------------------------------------------------------------
// Orders and stats
// ---------------------------------------------------------------------------

async fn stats(State(db): State<Db>, headers: HeaderMap) -> Reply<Json<Value>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let recent: Vec<&Order> = store.orders.values().rev().take(5).collect();
    let low_stock: Vec<&Product> = store.products.values().filter(|p| p.stock < 10).collect();
    Ok(Json(json!({
        "product_count": store.products.len(),
        "category_count": store.categories.len(),
        "order_count": store.orders.len(),
        "recent_orders": recent,
        "low_stock": low_stock,
    })))
}

async fn list_orders(State(db): State<Db>, headers: HeaderMap) -> Reply<Json<Vec<Order>>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    Ok(Json(store.orders.values().cloned().collect()))
}

async fn get_order(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<Json<Order>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    store.orders.get(&id).cloned().map(Json).ok_or_else(Failure::not_found)
}

async fn update_order(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(patch): Json<Value>,
) -> Reply<Json<Order>> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let order = store.orders.get_mut(&id).ok_or_else(Failure::not_found)?;
    apply_patch(order, patch)?;
    if order.is_paid && order.paid_at.is_none() {
        order.paid_at = Some(store::NOW.to_string());
    }
    Ok(Json(order.clone()))
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "active")]
    pub is_active: bool,
    pub category: u64,
}

fn active() -> bool {
    true
}

fn slugify(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

async fn list_products(State(db): State<Db>, headers: HeaderMap) -> Reply<Json<Vec<Product>>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    Ok(Json(store.products.values().cloned().collect()))
}

async fn get_product(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<Json<Product>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    store.products.get(&id).cloned().map(Json).ok_or_else(Failure::not_found)
}

async fn create_product(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<NewProduct>,
) -> Reply<(StatusCode, Json<Product>)> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    if input.name.trim().is_empty() {
        return Err(Failure::field_required("name"));
    }
    if !store.categories.contains_key(&input.category) {
        return Err(Failure::bad_request("Invalid category."));
    }
    let id = store.next_id();
    let product = Product {
        id,
        slug: input.slug.unwrap_or_else(|| slugify(&input.name)),
        name: input.name,
        description: input.description,
        price: input.price,
        sku: input.sku,
        image: None,
        stock: input.stock,
        is_active: input.is_active,
        category: input.category,
        images: Vec::new(),
        discount_price: None,
    };
    store.products.insert(id, product.clone());
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(patch): Json<Value>,
) -> Reply<Json<Product>> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let product = store.products.get_mut(&id).ok_or_else(Failure::not_found)?;
    apply_patch(product, patch)?;
    Ok(Json(product.clone()))
}

async fn delete_product(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<StatusCode> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    store
        .products
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(Failure::not_found)
}

async fn delete_product_image(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(image_id): Path<u64>,
) -> Reply<StatusCode> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    for product in store.products.values_mut() {
        let before = product.images.len();
        product.images.retain(|img| img.id != image_id);
        if product.images.len() != before {
            return Ok(StatusCode::NO_CONTENT);
        }
    }
    Err(Failure::not_found())
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "active")]
    pub is_active: bool,
    pub parent_category_id: Option<u64>,
}

/// Category as served: top-level records embed their children.
fn category_view(store: &Store, category: &Category) -> Value {
    let children: Vec<&Category> = store
        .categories
        .values()
        .filter(|c| c.parent_category_id == Some(category.id))
        .collect();
    let mut value = json!(category);
    value["subcategories"] = json!(children);
    value
}

async fn list_categories(State(db): State<Db>, headers: HeaderMap) -> Reply<Json<Vec<Value>>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    Ok(Json(
        store
            .categories
            .values()
            .map(|c| category_view(&store, c))
            .collect(),
    ))
}

async fn get_category(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<Json<Value>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let category = store.categories.get(&id).ok_or_else(Failure::not_found)?;
    Ok(Json(category_view(&store, category)))
}

async fn create_category(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<NewCategory>,
) -> Reply<(StatusCode, Json<Value>)> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    if input.name.trim().is_empty() {
        return Err(Failure::field_required("name"));
    }
    if let Some(parent) = input.parent_category_id {
        if !store.categories.contains_key(&parent) {
            return Err(Failure::bad_request("Invalid parent category."));
        }
    }
    let id = store.next_id();
    let category = Category {
        id,
        slug: input.slug.unwrap_or_else(|| slugify(&input.name)),
        name: input.name,
        description: input.description,
        is_active: input.is_active,
        parent_category_id: input.parent_category_id,
    };
    store.categories.insert(id, category.clone());
    Ok((StatusCode::CREATED, Json(category_view(&store, &category))))
}

async fn update_category(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(patch): Json<Value>,
) -> Reply<Json<Value>> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let category = store.categories.get_mut(&id).ok_or_else(Failure::not_found)?;
    apply_patch(category, patch)?;
    let category = category.clone();
    Ok(Json(category_view(&store, &category)))
}

async fn delete_category(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<StatusCode> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    store
        .categories
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(Failure::not_found)
}

// ---------------------------------------------------------------------------
// Blogs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NewBlog {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default = "manual")]
    pub blog_type: String,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

fn manual() -> String {
    "manual".to_string()
}

async fn list_blogs(State(db): State<Db>, headers: HeaderMap) -> Reply<Json<Vec<Blog>>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    Ok(Json(store.blogs.values().cloned().collect()))
}

async fn get_blog(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<Json<Blog>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    store.blogs.get(&id).cloned().map(Json).ok_or_else(Failure::not_found)
}

async fn create_blog(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<NewBlog>,
) -> Reply<(StatusCode, Json<Blog>)> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    if input.title.trim().is_empty() {
        return Err(Failure::field_required("title"));
    }
    let id = store.next_id();
    let blog = Blog {
        id,
        slug: input.slug.unwrap_or_else(|| slugify(&input.title)),
        title: input.title,
        blog_type: input.blog_type,
        content: input.content,
        excerpt: input.excerpt,
        featured_image: None,
        pdf_file: None,
        pdf_thumbnail: None,
        is_published: input.is_published,
        images: Vec::new(),
        created_at: store::NOW.to_string(),
        updated_at: store::NOW.to_string(),
    };
    store.blogs.insert(id, blog.clone());
    Ok((StatusCode::CREATED, Json(blog)))
}

async fn update_blog(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(patch): Json<Value>,
) -> Reply<Json<Blog>> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let blog = store.blogs.get_mut(&id).ok_or_else(Failure::not_found)?;
    apply_patch(blog, patch)?;
    blog.updated_at = store::NOW.to_string();
    Ok(Json(blog.clone()))
}

async fn delete_blog(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<StatusCode> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    store
        .blogs
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(Failure::not_found)
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// A multipart file field received by an upload route.
#[derive(Debug)]
struct ReceivedFile {
    file_name: String,
    len: usize,
}

/// Fields of a multipart body, split into text values and files.
#[derive(Debug, Default)]
struct ReceivedForm {
    texts: Vec<(String, String)>,
    files: Vec<(String, ReceivedFile)>,
}

impl ReceivedForm {
    fn text(&self, name: &str) -> Option<&str> {
        self.texts.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn file(&self, name: &str) -> Option<&ReceivedFile> {
        self.files.iter().find(|(k, _)| k == name).map(|(_, f)| f)
    }

    fn require_file(&self, name: &str) -> Reply<&ReceivedFile> {
        match self.file(name) {
            Some(file) if file.len > 0 => Ok(file),
            Some(_) => Err(Failure::bad_request("The submitted file is empty.")),
            None => Err(Failure::field_required(name)),
        }
    }
}

async fn read_form(mut multipart: Multipart) -> Reply<ReceivedForm> {
    let mut form = ReceivedForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Failure::bad_request(e.body_text()))?
    {
        read_field(&mut form, field).await?;
    }
    Ok(form)
}

async fn read_field(form: &mut ReceivedForm, field: Field<'_>) -> Reply<()> {
    let name = field.name().unwrap_or_default().to_string();
    match field.file_name().map(str::to_string) {
        Some(file_name) => {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Failure::bad_request(e.body_text()))?;
            form.files.push((
                name,
                ReceivedFile {
                    file_name,
                    len: bytes.len(),
                },
            ));
        }
        None => {
            let text = field
                .text()
                .await
                .map_err(|e| Failure::bad_request(e.body_text()))?;
            form.texts.push((name, text));
        }
    }
    Ok(())
}

/// Short-circuit an upload when a forced failure is configured.
fn upload_fault(store: &Store) -> Option<Response> {
    let status = store.faults.upload_status?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Some(status.into_response())
}

async fn upload_product_image(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> Reply<Response> {
    let form = read_form(multipart).await?;
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    if let Some(response) = upload_fault(&store) {
        return Ok(response);
    }
    let file = form.require_file("image")?;
    let color = form.text("color").unwrap_or("Default").to_string();
    let clear_old = form.text("clear_old") == Some("true");

    let image_id = store.next_id();
    let product = store.products.get_mut(&id).ok_or_else(Failure::not_found)?;
    if clear_old {
        product.images.retain(|img| img.color != color);
    }
    let image = ProductImage {
        id: image_id,
        image: format!("/media/products/{}", file.file_name),
        color,
        alt_text: form.text("alt_text").unwrap_or_default().to_string(),
        ordering: product.images.len() as i64,
    };
    product.images.push(image.clone());
    if product.image.is_none() {
        product.image = Some(image.image.clone());
    }
    Ok((StatusCode::CREATED, Json(image)).into_response())
}

async fn upload_blog_image(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> Reply<Response> {
    let form = read_form(multipart).await?;
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    if let Some(response) = upload_fault(&store) {
        return Ok(response);
    }
    let file = form.require_file("image")?;
    let ordering = match form.text("ordering") {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| Failure::bad_request("A valid integer is required."))?,
        None => 0,
    };

    let image_id = store.next_id();
    let blog = store.blogs.get_mut(&id).ok_or_else(Failure::not_found)?;
    let image = BlogImage {
        id: image_id,
        image: format!("/media/blogs/{}", file.file_name),
        alt_text: form.text("alt_text").unwrap_or_default().to_string(),
        ordering,
    };
    blog.images.push(image.clone());
    Ok((StatusCode::CREATED, Json(image)).into_response())
}

async fn upload_blog_featured_image(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> Reply<Response> {
    let form = read_form(multipart).await?;
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    if let Some(response) = upload_fault(&store) {
        return Ok(response);
    }
    let file = form.require_file("featured_image")?;

    let blog = store.blogs.get_mut(&id).ok_or_else(Failure::not_found)?;
    blog.featured_image = Some(format!("/media/blogs/featured/{}", file.file_name));
    blog.updated_at = store::NOW.to_string();
    Ok(Json(blog.clone()).into_response())
}

async fn upload_blog_pdf(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> Reply<Response> {
    let form = read_form(multipart).await?;
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    if let Some(response) = upload_fault(&store) {
        return Ok(response);
    }
    let pdf = form.require_file("pdf_file")?;
    let thumbnail = form.file("pdf_thumbnail").filter(|f| f.len > 0);

    let blog = store.blogs.get_mut(&id).ok_or_else(Failure::not_found)?;
    blog.blog_type = "pdf".to_string();
    blog.pdf_file = Some(format!("/media/blogs/pdfs/{}", pdf.file_name));
    if let Some(thumb) = thumbnail {
        blog.pdf_thumbnail = Some(format!("/media/blogs/thumbnails/{}", thumb.file_name));
    }
    blog.updated_at = store::NOW.to_string();
    Ok(Json(blog.clone()).into_response())
}

// ---------------------------------------------------------------------------
// Newsletter
// ---------------------------------------------------------------------------

async fn list_subscribers(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Reply<Json<Vec<Subscriber>>> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    Ok(Json(store.subscribers.values().cloned().collect()))
}

async fn update_subscriber(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(patch): Json<Value>,
) -> Reply<Json<Subscriber>> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let subscriber = store.subscribers.get_mut(&id).ok_or_else(Failure::not_found)?;
    apply_patch(subscriber, patch)?;
    Ok(Json(subscriber.clone()))
}

async fn delete_subscriber(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<StatusCode> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    store
        .subscribers
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(Failure::not_found)
}
