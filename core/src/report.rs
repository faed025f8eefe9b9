//! Derived views: the dashboard summary and subscriber reports.

use serde::Serialize;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::transport::Transport;
use crate::types::{Order, Product, Subscriber};

/// Products below this stock level count as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 10;
/// Rows shown in each dashboard list.
pub const DASHBOARD_ROWS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub product_count: usize,
    pub category_count: usize,
    pub order_count: usize,
    pub recent_orders: Vec<Order>,
    pub low_stock: Vec<Product>,
}

impl DashboardSummary {
    pub fn build(products: Vec<Product>, category_count: usize, orders: Vec<Order>) -> Self {
        let product_count = products.len();
        let order_count = orders.len();
        let low_stock = products
            .into_iter()
            .filter(|p| p.stock < LOW_STOCK_THRESHOLD)
            .take(DASHBOARD_ROWS)
            .collect();
        let recent_orders = orders.into_iter().take(DASHBOARD_ROWS).collect();
        Self {
            product_count,
            category_count,
            order_count,
            recent_orders,
            low_stock,
        }
    }
}

impl<T: Transport> ApiClient<T> {
    /// Load products, categories and orders concurrently and summarize them.
    /// Fails with the first error if any of the three calls fails.
    pub async fn dashboard(&self) -> Result<DashboardSummary, ApiError> {
        let (products, categories, orders) = tokio::try_join!(
            self.list_products(),
            self.list_categories(),
            self.list_orders(),
        )?;
        Ok(DashboardSummary::build(products, categories.len(), orders))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriberCounts {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

impl From<&[Subscriber]> for SubscriberCounts {
    fn from(subscribers: &[Subscriber]) -> Self {
        let active = subscribers.iter().filter(|s| s.is_active).count();
        Self {
            total: subscribers.len(),
            active,
            inactive: subscribers.len() - active,
        }
    }
}

/// Subscribers whose email contains `query`, ignoring case.
pub fn filter_subscribers<'a>(subscribers: &'a [Subscriber], query: &str) -> Vec<&'a Subscriber> {
    let query = query.to_lowercase();
    subscribers
        .iter()
        .filter(|s| s.email.to_lowercase().contains(&query))
        .collect()
}

/// Render subscribers as CSV with every cell quoted.
pub fn subscribers_csv(subscribers: &[Subscriber]) -> String {
    let header = csv_row(["Email", "Subscribed Date", "Status"]);
    let rows = subscribers.iter().map(|s| {
        let status = if s.is_active { "Active" } else { "Inactive" };
        csv_row([s.email.as_str(), s.subscribed_at.as_str(), status])
    });
    std::iter::once(header).chain(rows).collect::<Vec<_>>().join("\n")
}

fn csv_row<'a>(cells: impl IntoIterator<Item = &'a str>) -> String {
    cells
        .into_iter()
        .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderUser;

    fn product(id: u64, stock: i64) -> Product {
        Product {
            id,
            name: format!("p{id}"),
            slug: format!("p{id}"),
            description: String::new(),
            price: "1.00".to_string(),
            sku: format!("SKU-{id}"),
            image: None,
            stock,
            is_active: true,
            category: 1,
            images: Vec::new(),
            discount: None,
            discount_price: None,
        }
    }

    fn order(id: u64) -> Order {
        Order {
            id,
            user: OrderUser {
                id: 1,
                username: "alice".to_string(),
                email: String::new(),
                first_name: String::new(),
                last_name: String::new(),
            },
            status: "pending".to_string(),
            total_amount: "10.00".to_string(),
            is_paid: false,
            paid_at: None,
            items: Vec::new(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn subscriber(id: u64, email: &str, is_active: bool) -> Subscriber {
        Subscriber {
            id,
            email: email.to_string(),
            subscribed_at: "2024-05-01T10:00:00Z".to_string(),
            is_active,
        }
    }

    #[test]
    fn summary_counts_and_truncates() {
        let products = (1..=8).map(|i| product(i, if i % 2 == 0 { 2 } else { 50 })).collect();
        let orders = (1..=6).map(order).collect();
        let summary = DashboardSummary::build(products, 3, orders);

        assert_eq!(summary.product_count, 8);
        assert_eq!(summary.category_count, 3);
        assert_eq!(summary.order_count, 6);
        assert_eq!(
            summary.recent_orders.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(
            summary.low_stock.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![2, 4, 6, 8]
        );
    }

    #[test]
    fn stock_at_threshold_is_not_low() {
        let summary = DashboardSummary::build(vec![product(1, 10), product(2, 9)], 0, Vec::new());
        assert_eq!(summary.low_stock.len(), 1);
        assert_eq!(summary.low_stock[0].id, 2);
    }

    #[test]
    fn csv_quotes_every_cell() {
        let csv = subscribers_csv(&[
            subscriber(1, "a@example.com", true),
            subscriber(2, "odd\"name@example.com", false),
        ]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], r#""Email","Subscribed Date","Status""#);
        assert_eq!(lines[1], r#""a@example.com","2024-05-01T10:00:00Z","Active""#);
        assert_eq!(
            lines[2],
            r#""odd""name@example.com","2024-05-01T10:00:00Z","Inactive""#
        );
    }

    #[test]
    fn csv_of_nobody_is_just_the_header() {
        assert_eq!(subscribers_csv(&[]), r#""Email","Subscribed Date","Status""#);
    }

    #[test]
    fn counts_and_filter() {
        let subs = vec![
            subscriber(1, "Ann@Example.com", true),
            subscriber(2, "bob@example.com", false),
            subscriber(3, "carl@other.org", true),
        ];
        assert_eq!(
            SubscriberCounts::from(subs.as_slice()),
            SubscriberCounts { total: 3, active: 2, inactive: 1 }
        );
        let hits = filter_subscribers(&subs, "EXAMPLE");
        assert_eq!(hits.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);
    }
}
