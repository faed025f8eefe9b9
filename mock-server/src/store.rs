//! In-memory records and seed data for the mock admin backend.
//!
//! Records are defined here independently of `admin-core`'s DTOs so the
//! integration tests catch schema drift between the two.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

pub const SEED_USERNAME: &str = "admin";
pub const SEED_PASSWORD: &str = "admin123";

/// Timestamp stamped on records created at runtime.
pub const NOW: &str = "2024-06-01T12:00:00Z";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderProduct {
    pub id: u64,
    pub name: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: u64,
    pub product: OrderProduct,
    pub quantity: u32,
    pub price: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub user: User,
    pub status: String,
    pub total_amount: String,
    pub is_paid: bool,
    pub paid_at: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub is_active: bool,
    pub parent_category_id: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: u64,
    pub image: String,
    pub color: String,
    pub alt_text: String,
    pub ordering: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: String,
    pub sku: String,
    pub image: Option<String>,
    pub stock: i64,
    pub is_active: bool,
    pub category: u64,
    pub images: Vec<ProductImage>,
    pub discount_price: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlogImage {
    pub id: u64,
    pub image: String,
    pub alt_text: String,
    pub ordering: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blog {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub blog_type: String,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub pdf_file: Option<String>,
    pub pdf_thumbnail: Option<String>,
    pub is_published: bool,
    pub images: Vec<BlogImage>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: u64,
    pub email: String,
    pub subscribed_at: String,
    pub is_active: bool,
}

/// Forced failures for exercising client error paths.
#[derive(Clone, Debug, Default)]
pub struct Faults {
    /// Every multipart upload answers this status with an empty body.
    pub upload_status: Option<u16>,
}

#[derive(Debug, Default)]
pub struct Store {
    pub passwords: HashMap<String, String>,
    pub users: HashMap<String, User>,
    /// Issued access tokens mapped to usernames.
    pub sessions: HashMap<String, String>,
    pub orders: BTreeMap<u64, Order>,
    pub categories: BTreeMap<u64, Category>,
    pub products: BTreeMap<u64, Product>,
    pub blogs: BTreeMap<u64, Blog>,
    pub subscribers: BTreeMap<u64, Subscriber>,
    pub faults: Faults,
    next_id: u64,
}

impl Store {
    /// Empty store with a single admin account.
    pub fn new() -> Self {
        let mut store = Self {
            next_id: 1000,
            ..Self::default()
        };
        store.add_user(
            User {
                id: 1,
                username: SEED_USERNAME.to_string(),
                email: "admin@example.com".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Admin".to_string(),
            },
            SEED_PASSWORD,
        );
        store
    }

    pub fn add_user(&mut self, user: User, password: &str) {
        self.passwords.insert(user.username.clone(), password.to_string());
        self.users.insert(user.username.clone(), user);
    }

    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Admin account plus a small catalog, two orders, a blog post and two
    /// newsletter subscribers.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        let customer = User {
            id: 2,
            username: "carol".to_string(),
            email: "carol@example.com".to_string(),
            first_name: "Carol".to_string(),
            last_name: "Buyer".to_string(),
        };

        for (id, name, slug) in [(1, "Mugs", "mugs"), (2, "Shirts", "shirts")] {
            store.categories.insert(
                id,
                Category {
                    id,
                    name: name.to_string(),
                    slug: slug.to_string(),
                    description: String::new(),
                    is_active: true,
                    parent_category_id: None,
                },
            );
        }

        for (id, name, price, stock, category) in [
            (1, "Coffee Mug", "12.00", 25, 1),
            (2, "Tea Mug", "10.50", 4, 1),
            (3, "Logo Shirt", "25.00", 0, 2),
        ] {
            store.products.insert(
                id,
                Product {
                    id,
                    name: name.to_string(),
                    slug: name.to_lowercase().replace(' ', "-"),
                    description: String::new(),
                    price: price.to_string(),
                    sku: format!("SKU-{id:03}"),
                    image: None,
                    stock,
                    is_active: true,
                    category,
                    images: Vec::new(),
                    discount_price: None,
                },
            );
        }

        for (id, status, total, is_paid) in [(1, "pending", "24.00", false), (2, "shipped", "25.00", true)] {
            let product = &store.products[&id];
            store.orders.insert(
                id,
                Order {
                    id,
                    user: customer.clone(),
                    status: status.to_string(),
                    total_amount: total.to_string(),
                    is_paid,
                    paid_at: is_paid.then(|| "2024-05-02T09:30:00Z".to_string()),
                    items: vec![OrderItem {
                        id: id * 10,
                        product: OrderProduct {
                            id: product.id,
                            name: product.name.clone(),
                            price: product.price.clone(),
                            image: None,
                        },
                        quantity: 2,
                        price: product.price.clone(),
                    }],
                    created_at: "2024-05-01T08:00:00Z".to_string(),
                },
            );
        }

        store.blogs.insert(
            1,
            Blog {
                id: 1,
                title: "Brewing Basics".to_string(),
                slug: "brewing-basics".to_string(),
                blog_type: "manual".to_string(),
                content: Some("Use fresh beans.".to_string()),
                excerpt: None,
                featured_image: None,
                pdf_file: None,
                pdf_thumbnail: None,
                is_published: true,
                images: Vec::new(),
                created_at: "2024-04-01T00:00:00Z".to_string(),
                updated_at: "2024-04-01T00:00:00Z".to_string(),
            },
        );

        for (id, email, is_active) in [(1, "ann@example.com", true), (2, "ben@example.org", false)] {
            store.subscribers.insert(
                id,
                Subscriber {
                    id,
                    email: email.to_string(),
                    subscribed_at: "2024-03-15T10:00:00Z".to_string(),
                    is_active,
                },
            );
        }

        store
    }
}
