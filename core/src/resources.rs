//! Typed endpoint families of the admin API.
//!
//! Each method is a thin wrapper over `ApiClient::request_as` (or the
//! multipart path for uploads) that fixes the verb, path and result type.
//! DELETE endpoints discard whatever payload the backend returns.

use serde_json::Value;

use crate::client::{to_body, ApiClient, RequestOptions};
use crate::error::ApiError;
use crate::http::UploadFile;
use crate::transport::Transport;
use crate::types::{
    AdminStats, Blog, BlogInput, Category, CategoryInput, Order, OrderUpdate, Product,
    ProductInput, Subscriber, SubscriberUpdate,
};
use crate::upload::{featured_image_form, pdf_form, BlogImageUpload, ProductImageUpload};

const ORDERS: &str = "/admin/orders/";
const PRODUCTS: &str = "/catalog/admin/products/";
const CATEGORIES: &str = "/catalog/admin/categories/";
const BLOGS: &str = "/blogs/admin/blogs/";
const SUBSCRIBERS: &str = "/newsletter/admin/subscribers/";

fn item(collection: &str, id: u64) -> String {
    format!("{collection}{id}/")
}

impl<T: Transport> ApiClient<T> {
    async fn remove(&self, path: &str) -> Result<(), ApiError> {
        self.request(path, RequestOptions::delete()).await.map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.request_as(ORDERS, RequestOptions::get()).await
    }

    pub async fn get_order(&self, id: u64) -> Result<Order, ApiError> {
        self.request_as(&item(ORDERS, id), RequestOptions::get()).await
    }

    pub async fn update_order(&self, id: u64, update: &OrderUpdate) -> Result<Order, ApiError> {
        self.request_as(&item(ORDERS, id), RequestOptions::patch(to_body(update)?))
            .await
    }

    pub async fn mark_order_paid(&self, id: u64) -> Result<Order, ApiError> {
        let update = OrderUpdate {
            is_paid: Some(true),
            ..Default::default()
        };
        self.update_order(id, &update).await
    }

    pub async fn mark_order_shipped(&self, id: u64) -> Result<Order, ApiError> {
        let update = OrderUpdate {
            status: Some("shipped".to_string()),
            ..Default::default()
        };
        self.update_order(id, &update).await
    }

    /// Server-computed dashboard counters.
    pub async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        self.request_as("/admin/stats/", RequestOptions::get()).await
    }

    // -----------------------------------------------------------------------
    // Products
    // -----------------------------------------------------------------------

    pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        self.request_as(PRODUCTS, RequestOptions::get()).await
    }

    pub async fn get_product(&self, id: u64) -> Result<Product, ApiError> {
        self.request_as(&item(PRODUCTS, id), RequestOptions::get()).await
    }

    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, ApiError> {
        self.request_as(PRODUCTS, RequestOptions::post(to_body(input)?))
            .await
    }

    pub async fn update_product(&self, id: u64, input: &ProductInput) -> Result<Product, ApiError> {
        self.request_as(&item(PRODUCTS, id), RequestOptions::patch(to_body(input)?))
            .await
    }

    pub async fn delete_product(&self, id: u64) -> Result<(), ApiError> {
        self.remove(&item(PRODUCTS, id)).await
    }

    /// Attach an image to a product. Returns the backend's image record as
    /// opaque JSON.
    pub async fn upload_product_image(
        &self,
        product_id: u64,
        upload: ProductImageUpload,
    ) -> Result<Value, ApiError> {
        let path = format!("{PRODUCTS}{product_id}/upload-image/");
        self.upload(&path, upload.into_form()).await
    }

    pub async fn delete_product_image(&self, image_id: u64) -> Result<(), ApiError> {
        self.remove(&format!("/catalog/admin/images/{image_id}/delete/"))
            .await
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.request_as(CATEGORIES, RequestOptions::get()).await
    }

    pub async fn get_category(&self, id: u64) -> Result<Category, ApiError> {
        self.request_as(&item(CATEGORIES, id), RequestOptions::get()).await
    }

    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category, ApiError> {
        self.request_as(CATEGORIES, RequestOptions::post(to_body(input)?))
            .await
    }

    pub async fn update_category(
        &self,
        id: u64,
        input: &CategoryInput,
    ) -> Result<Category, ApiError> {
        self.request_as(&item(CATEGORIES, id), RequestOptions::patch(to_body(input)?))
            .await
    }

    pub async fn delete_category(&self, id: u64) -> Result<(), ApiError> {
        self.remove(&item(CATEGORIES, id)).await
    }

    // -----------------------------------------------------------------------
    // Blogs
    // -----------------------------------------------------------------------

    pub async fn list_blogs(&self) -> Result<Vec<Blog>, ApiError> {
        self.request_as(BLOGS, RequestOptions::get()).await
    }

    pub async fn get_blog(&self, id: u64) -> Result<Blog, ApiError> {
        self.request_as(&item(BLOGS, id), RequestOptions::get()).await
    }

    pub async fn create_blog(&self, input: &BlogInput) -> Result<Blog, ApiError> {
        self.request_as(BLOGS, RequestOptions::post(to_body(input)?))
            .await
    }

    pub async fn update_blog(&self, id: u64, input: &BlogInput) -> Result<Blog, ApiError> {
        self.request_as(&item(BLOGS, id), RequestOptions::patch(to_body(input)?))
            .await
    }

    pub async fn delete_blog(&self, id: u64) -> Result<(), ApiError> {
        self.remove(&item(BLOGS, id)).await
    }

    /// Add an inline image to a blog's gallery.
    pub async fn upload_blog_image(
        &self,
        blog_id: u64,
        upload: BlogImageUpload,
    ) -> Result<Value, ApiError> {
        let path = format!("{BLOGS}{blog_id}/upload-multi-image/");
        self.upload(&path, upload.into_form()).await
    }

    pub async fn upload_blog_featured_image(
        &self,
        blog_id: u64,
        image: UploadFile,
    ) -> Result<Value, ApiError> {
        let path = format!("{BLOGS}{blog_id}/upload-image/");
        self.upload(&path, featured_image_form(image)).await
    }

    pub async fn upload_blog_pdf(
        &self,
        blog_id: u64,
        pdf: UploadFile,
        thumbnail: Option<UploadFile>,
    ) -> Result<Value, ApiError> {
        let path = format!("{BLOGS}{blog_id}/upload-pdf/");
        self.upload(&path, pdf_form(pdf, thumbnail)).await
    }

    // -----------------------------------------------------------------------
    // Newsletter
    // -----------------------------------------------------------------------

    pub async fn list_subscribers(&self) -> Result<Vec<Subscriber>, ApiError> {
        self.request_as(SUBSCRIBERS, RequestOptions::get()).await
    }

    /// Flip a subscriber's active flag. `is_active` is the current state.
    pub async fn toggle_subscriber(&self, id: u64, is_active: bool) -> Result<Subscriber, ApiError> {
        let update = SubscriberUpdate {
            is_active: Some(!is_active),
        };
        self.request_as(&item(SUBSCRIBERS, id), RequestOptions::patch(to_body(&update)?))
            .await
    }

    pub async fn unsubscribe(&self, id: u64) -> Result<(), ApiError> {
        self.remove(&item(SUBSCRIBERS, id)).await
    }
}
