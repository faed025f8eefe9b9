//! Domain DTOs for the admin API.
//!
//! # Design
//! Records are passed between the backend and the caller without client-side
//! invariants. Fields the backend may omit default instead of failing the
//! decode. Monetary amounts stay as the decimal strings the backend sends.
//!
//! `*Input` / `*Update` types are partial payloads for POST and PATCH: only
//! the fields that are set are serialized.

use serde::{Deserialize, Serialize};

/// Profile returned by `/accounts/me/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl User {
    /// Placeholder profile for a user known only by name. The token endpoint
    /// does not return a profile, so login synthesizes this until
    /// `/accounts/me/` answers.
    pub fn placeholder(username: &str) -> Self {
        Self {
            id: 0,
            username: username.to_string(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }
}

/// Result of `ApiClient::login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProduct {
    pub id: u64,
    pub name: String,
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: u64,
    pub product: OrderProduct,
    pub quantity: u32,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub user: OrderUser,
    pub status: String,
    pub total_amount: String,
    pub is_paid: bool,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub created_at: String,
}

/// PATCH payload for `/admin/orders/{id}/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_category_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcategories: Vec<Subcategory>,
}

/// POST/PATCH payload for categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_category_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: u64,
    pub image: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub ordering: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub id: u64,
    pub original_price: String,
    pub discount_price: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub image: Option<String>,
    pub stock: i64,
    pub is_active: bool,
    pub category: u64,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Discount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<String>,
}

/// POST/PATCH payload for products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<String>,
}

/// Dashboard counters served by `/admin/stats/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub product_count: u64,
    pub category_count: u64,
    pub order_count: u64,
    #[serde(default)]
    pub recent_orders: Vec<Order>,
    #[serde(default)]
    pub low_stock: Vec<Product>,
}

// ---------------------------------------------------------------------------
// Blogs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogType {
    Manual,
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blog {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub blog_type: BlogType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub pdf_file: Option<String>,
    #[serde(default)]
    pub pdf_thumbnail: Option<String>,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// POST/PATCH payload for blogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blog_type: Option<BlogType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

// ---------------------------------------------------------------------------
// Newsletter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: u64,
    pub email: String,
    pub subscribed_at: String,
    pub is_active: bool,
}

/// PATCH payload for `/newsletter/admin/subscribers/{id}/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_inputs_serialize_only_set_fields() {
        let update = OrderUpdate {
            is_paid: Some(true),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"is_paid": true}));

        let input = ProductInput {
            name: Some("Mug".to_string()),
            stock: Some(3),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"name": "Mug", "stock": 3})
        );
    }

    #[test]
    fn product_tolerates_missing_optional_fields() {
        let product: Product = serde_json::from_value(json!({
            "id": 1,
            "name": "Mug",
            "slug": "mug",
            "price": "9.99",
            "stock": 4,
            "is_active": true,
            "category": 2
        }))
        .unwrap();
        assert!(product.images.is_empty());
        assert!(product.discount.is_none());
        assert_eq!(product.sku, "");
    }

    #[test]
    fn blog_type_is_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_value(BlogType::Pdf).unwrap(), json!("pdf"));
        let parsed: BlogType = serde_json::from_value(json!("manual")).unwrap();
        assert_eq!(parsed, BlogType::Manual);
    }

    #[test]
    fn placeholder_user_has_empty_profile() {
        let user = User::placeholder("alice");
        assert_eq!(user.id, 0);
        assert_eq!(user.username, "alice");
        assert!(user.email.is_empty() && user.first_name.is_empty() && user.last_name.is_empty());
    }
}
