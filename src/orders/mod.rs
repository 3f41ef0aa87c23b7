/// Order storage: line items, shipping snapshots, status lifecycle
use crate::error::{ApiError, ApiResult};
use crate::inventory::StockRequest;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Fixed order status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "canceled" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured line item. The product reference may be absent for guest
/// or unmatched items; name and price are snapshotted at order time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "product")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

impl OrderItem {
    pub fn stock_request(&self) -> StockRequest {
        StockRequest {
            product_id: self.product_id.clone(),
            quantity: self.quantity,
        }
    }
}

/// Convert line items into stock operation inputs
pub fn stock_requests(items: &[OrderItem]) -> Vec<StockRequest> {
    items.iter().map(OrderItem::stock_request).collect()
}

/// Shipping address snapshot stored with the order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    pub postal: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(rename = "user", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub order_number: String,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_info: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_session_id: Option<String>,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for persisting a new order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<String>,
    pub order_number: Option<String>,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_info: Option<serde_json::Value>,
    pub payment_session_id: Option<String>,
}

/// Revenue and order count for one calendar day
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SalesBucket {
    pub revenue: f64,
    pub orders: i64,
}

/// Per-product sales rollup
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub name: String,
    pub quantity: i64,
    pub revenue: f64,
}

/// Aggregated order analytics over a time window
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_orders: i64,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub status_counts: HashMap<String, i64>,
    pub category_data: HashMap<String, i64>,
    pub sales_by_date: BTreeMap<String, SalesBucket>,
    pub top_products: Vec<ProductSales>,
}

/// Generate a human-readable order number (ORD- plus six digits)
pub fn generate_order_number() -> String {
    let digits = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("ORD-{}", digits)
}

/// Order persistence over SQLite
pub struct OrderStore {
    db: SqlitePool,
}

impl OrderStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Persist an order and its line items in one transaction
    pub async fn create(&self, new_order: NewOrder) -> ApiResult<Order> {
        let id = Uuid::new_v4().to_string();
        let order_number = new_order
            .order_number
            .unwrap_or_else(generate_order_number);
        let now = Utc::now();
        let ship = new_order.shipping_address.as_ref();

        let mut tx = self.db.begin().await.map_err(ApiError::Database)?;

        sqlx::query(
            "INSERT INTO orders (
                id, user_id, order_number, total, status, tracking_number,
                ship_full_name, ship_email, ship_phone, ship_address,
                ship_city, ship_postal, ship_country,
                payment_info, payment_session_id, email_sent, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, FALSE, ?15, ?15)",
        )
        .bind(&id)
        .bind(&new_order.user_id)
        .bind(&order_number)
        .bind(new_order.total)
        .bind(new_order.status.as_str())
        .bind(ship.map(|s| s.full_name.clone()))
        .bind(ship.map(|s| s.email.clone()))
        .bind(ship.and_then(|s| s.phone.clone()))
        .bind(ship.map(|s| s.address.clone()))
        .bind(ship.map(|s| s.city.clone()))
        .bind(ship.map(|s| s.postal.clone()))
        .bind(ship.map(|s| s.country.clone()))
        .bind(new_order.payment_info.as_ref().map(|v| v.to_string()))
        .bind(&new_order.payment_session_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::Database)?;

        for item in &new_order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, name, price, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::Database)?;
        }

        tx.commit().await.map_err(ApiError::Database)?;

        tracing::info!("Order {} created ({})", order_number, id);

        Ok(Order {
            id,
            user_id: new_order.user_id,
            order_number,
            items: new_order.items,
            total: new_order.total,
            status: new_order.status,
            tracking_number: None,
            shipping_address: new_order.shipping_address,
            payment_info: new_order.payment_info,
            payment_session_id: new_order.payment_session_id,
            email_sent: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get(&self, id: &str) -> ApiResult<Option<Order>> {
        self.fetch_one("SELECT * FROM orders WHERE id = ?1", id).await
    }

    pub async fn get_by_number(&self, order_number: &str) -> ApiResult<Option<Order>> {
        self.fetch_one("SELECT * FROM orders WHERE order_number = ?1", order_number)
            .await
    }

    pub async fn get_by_session(&self, session_id: &str) -> ApiResult<Option<Order>> {
        self.fetch_one(
            "SELECT * FROM orders WHERE payment_session_id = ?1",
            session_id,
        )
        .await
    }

    async fn fetch_one(&self, query: &str, param: &str) -> ApiResult<Option<Order>> {
        let row = sqlx::query(query)
            .bind(param)
            .fetch_optional(&self.db)
            .await
            .map_err(ApiError::Database)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Most recent orders, newest first
    pub async fn list_recent(&self, limit: i64) -> ApiResult<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders ORDER BY created_at DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .map_err(ApiError::Database)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    pub async fn list_for_user(&self, user_id: &str) -> ApiResult<Vec<Order>> {
        let rows =
            sqlx::query("SELECT * FROM orders WHERE user_id = ?1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.db)
                .await
                .map_err(ApiError::Database)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    pub async fn count(&self) -> ApiResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM orders")
            .fetch_one(&self.db)
            .await
            .map_err(ApiError::Database)?;
        Ok(row.get("count"))
    }

    /// Aggregate revenue, status, and product rollups for orders created
    /// at or after `start`
    pub async fn analytics_since(&self, start: DateTime<Utc>) -> ApiResult<AnalyticsReport> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE created_at >= ?1 ORDER BY created_at DESC",
        )
        .bind(start)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }

        let total_orders = orders.len() as i64;
        let total_revenue: f64 = orders.iter().map(|o| o.total).sum();
        let avg_order_value = if orders.is_empty() {
            0.0
        } else {
            total_revenue / total_orders as f64
        };

        let mut status_counts: HashMap<String, i64> = HashMap::new();
        let mut sales_by_date: BTreeMap<String, SalesBucket> = BTreeMap::new();
        let mut product_sales: HashMap<String, ProductSales> = HashMap::new();

        for order in &orders {
            *status_counts.entry(order.status.to_string()).or_insert(0) += 1;

            let day = order.created_at.format("%Y-%m-%d").to_string();
            let bucket = sales_by_date.entry(day).or_default();
            bucket.revenue += order.total;
            bucket.orders += 1;

            for item in &order.items {
                // Items without a product reference cannot be rolled up
                let Some(product_id) = &item.product_id else {
                    continue;
                };
                let entry = product_sales
                    .entry(product_id.clone())
                    .or_insert_with(|| ProductSales {
                        name: item.name.clone().unwrap_or_else(|| "Unknown".to_string()),
                        quantity: 0,
                        revenue: 0.0,
                    });
                entry.quantity += item.quantity;
                entry.revenue += item.price * item.quantity as f64;
            }
        }

        let mut top_products: Vec<ProductSales> = product_sales.into_values().collect();
        top_products.sort_by(|a, b| {
            b.revenue
                .partial_cmp(&a.revenue)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        top_products.truncate(10);

        // Line items only snapshot names, so the category rollup joins
        // back through the catalog
        let category_rows = sqlx::query(
            "SELECT p.category AS category, SUM(oi.quantity) AS quantity
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             JOIN products p ON p.id = oi.product_id
             WHERE o.created_at >= ?1 AND p.category IS NOT NULL
             GROUP BY p.category",
        )
        .bind(start)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let category_data = category_rows
            .iter()
            .map(|row| (row.get::<String, _>("category"), row.get::<i64, _>("quantity")))
            .collect();

        Ok(AnalyticsReport {
            total_orders,
            total_revenue,
            avg_order_value,
            status_counts,
            category_data,
            sales_by_date,
            top_products,
        })
    }

    /// Set the status (and optionally a tracking number), returning the
    /// updated order
    pub async fn update_status(
        &self,
        id: &str,
        status: OrderStatus,
        tracking_number: Option<&str>,
    ) -> ApiResult<Option<Order>> {
        match tracking_number {
            Some(tracking) => {
                sqlx::query(
                    "UPDATE orders SET status = ?1, tracking_number = ?2, updated_at = ?3
                     WHERE id = ?4",
                )
                .bind(status.as_str())
                .bind(tracking)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.db)
                .await
                .map_err(ApiError::Database)?;
            }
            None => {
                sqlx::query("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3")
                    .bind(status.as_str())
                    .bind(Utc::now())
                    .bind(id)
                    .execute(&self.db)
                    .await
                    .map_err(ApiError::Database)?;
            }
        }

        self.get(id).await
    }

    pub async fn mark_email_sent(&self, id: &str) -> ApiResult<()> {
        sqlx::query("UPDATE orders SET email_sent = TRUE, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;
        Ok(())
    }

    async fn hydrate(&self, row: sqlx::sqlite::SqliteRow) -> ApiResult<Order> {
        let id: String = row.get("id");

        let item_rows = sqlx::query(
            "SELECT product_id, name, price, quantity FROM order_items
             WHERE order_id = ?1 ORDER BY id ASC",
        )
        .bind(&id)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let items = item_rows
            .iter()
            .map(|r| OrderItem {
                product_id: r.get("product_id"),
                name: r.get("name"),
                price: r.get("price"),
                quantity: r.get("quantity"),
            })
            .collect();

        let shipping_address = match (
            row.get::<Option<String>, _>("ship_full_name"),
            row.get::<Option<String>, _>("ship_email"),
        ) {
            (Some(full_name), Some(email)) => Some(ShippingAddress {
                full_name,
                email,
                phone: row.get("ship_phone"),
                address: row.get::<Option<String>, _>("ship_address").unwrap_or_default(),
                city: row.get::<Option<String>, _>("ship_city").unwrap_or_default(),
                postal: row.get::<Option<String>, _>("ship_postal").unwrap_or_default(),
                country: row.get::<Option<String>, _>("ship_country").unwrap_or_default(),
            }),
            _ => None,
        };

        let payment_info = row
            .get::<Option<String>, _>("payment_info")
            .and_then(|raw| serde_json::from_str(&raw).ok());

        let status: String = row.get("status");

        Ok(Order {
            id,
            user_id: row.get("user_id"),
            order_number: row.get("order_number"),
            items,
            total: row.get("total"),
            status: OrderStatus::parse(&status).unwrap_or(OrderStatus::Pending),
            tracking_number: row.get("tracking_number"),
            shipping_address,
            payment_info,
            payment_session_id: row.get("payment_session_id"),
            email_sent: row.get("email_sent"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[cfg(test)]
pub(crate) async fn create_test_tables(db: &SqlitePool) {
    sqlx::query(
        "CREATE TABLE orders (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            order_number TEXT NOT NULL,
            total REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            tracking_number TEXT,
            ship_full_name TEXT,
            ship_email TEXT,
            ship_phone TEXT,
            ship_address TEXT,
            ship_city TEXT,
            ship_postal TEXT,
            ship_country TEXT,
            payment_info TEXT,
            payment_session_id TEXT,
            email_sent BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )",
    )
    .execute(db)
    .await
    .unwrap();

    sqlx::query(
        "CREATE TABLE order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL,
            product_id TEXT,
            name TEXT,
            price REAL NOT NULL DEFAULT 0,
            quantity INTEGER NOT NULL DEFAULT 1
        )",
    )
    .execute(db)
    .await
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> OrderStore {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        create_test_tables(&db).await;
        OrderStore::new(db)
    }

    fn sample_address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Amira Khan".to_string(),
            email: "amira@example.com".to_string(),
            phone: Some("+92 300 0000000".to_string()),
            address: "12 Mall Road".to_string(),
            city: "Lahore".to_string(),
            postal: "54000".to_string(),
            country: "PK".to_string(),
        }
    }

    fn sample_order() -> NewOrder {
        NewOrder {
            user_id: Some("user-1".to_string()),
            order_number: None,
            items: vec![
                OrderItem {
                    product_id: Some("prod-1".to_string()),
                    name: Some("Wool Shawl".to_string()),
                    price: 2500.0,
                    quantity: 2,
                },
                OrderItem {
                    product_id: None,
                    name: Some("Gift Wrap".to_string()),
                    price: 100.0,
                    quantity: 1,
                },
            ],
            total: 5100.0,
            status: OrderStatus::Pending,
            shipping_address: Some(sample_address()),
            payment_info: Some(serde_json::json!({ "method": "cod" })),
            payment_session_id: None,
        }
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), 10);
        assert!(number[4..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Canceled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("returned"), None);
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = setup().await;
        let created = store.create(sample_order()).await.unwrap();

        let loaded = store.get(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.order_number, created.order_number);
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.items[0].quantity, 2);
        assert_eq!(loaded.items[1].product_id, None);
        assert_eq!(loaded.total, 5100.0);
        assert!(!loaded.email_sent);

        let address = loaded.shipping_address.unwrap();
        assert_eq!(address.city, "Lahore");
    }

    #[tokio::test]
    async fn test_get_by_number_and_session() {
        let store = setup().await;
        let mut new_order = sample_order();
        new_order.order_number = Some("ORD-123456".to_string());
        new_order.payment_session_id = Some("cs_test_abc".to_string());
        store.create(new_order).await.unwrap();

        let by_number = store.get_by_number("ORD-123456").await.unwrap();
        assert!(by_number.is_some());

        let by_session = store.get_by_session("cs_test_abc").await.unwrap();
        assert_eq!(by_session.unwrap().order_number, "ORD-123456");

        assert!(store.get_by_number("ORD-000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_for_user_filters() {
        let store = setup().await;
        store.create(sample_order()).await.unwrap();

        let mut other = sample_order();
        other.user_id = Some("user-2".to_string());
        store.create(other).await.unwrap();

        let mut guest = sample_order();
        guest.user_id = None;
        store.create(guest).await.unwrap();

        let mine = store.list_for_user("user-1").await.unwrap();
        assert_eq!(mine.len(), 1);

        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(store.list_recent(50).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_status_and_tracking() {
        let store = setup().await;
        let created = store.create(sample_order()).await.unwrap();

        let updated = store
            .update_status(&created.id, OrderStatus::Shipped, Some("TRK-9"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Shipped);
        assert_eq!(updated.tracking_number.as_deref(), Some("TRK-9"));

        // Status-only update keeps the tracking number
        let updated = store
            .update_status(&created.id, OrderStatus::Delivered, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Delivered);
        assert_eq!(updated.tracking_number.as_deref(), Some("TRK-9"));
    }

    #[tokio::test]
    async fn test_mark_email_sent() {
        let store = setup().await;
        let created = store.create(sample_order()).await.unwrap();

        store.mark_email_sent(&created.id).await.unwrap();
        assert!(store.get(&created.id).await.unwrap().unwrap().email_sent);
    }

    async fn setup_with_catalog() -> (OrderStore, crate::catalog::ProductCatalog) {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        create_test_tables(&db).await;
        crate::catalog::create_test_tables(&db).await;
        (
            OrderStore::new(db.clone()),
            crate::catalog::ProductCatalog::new(db),
        )
    }

    #[tokio::test]
    async fn test_analytics_rollups() {
        use crate::catalog::NewProduct;

        let (store, catalog) = setup_with_catalog().await;

        let shawl = catalog
            .create(NewProduct {
                name: "Wool Shawl".to_string(),
                price: 2500.0,
                qty: 50,
                category: Some("Shawls".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let wrap = catalog
            .create(NewProduct {
                name: "Gift Wrap".to_string(),
                price: 100.0,
                qty: 50,
                category: Some("Extras".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut first = sample_order();
        first.items = vec![OrderItem {
            product_id: Some(shawl.id.clone()),
            name: Some("Wool Shawl".to_string()),
            price: 2500.0,
            quantity: 2,
        }];
        first.total = 5000.0;
        store.create(first).await.unwrap();

        let mut second = sample_order();
        second.items = vec![OrderItem {
            product_id: Some(wrap.id.clone()),
            name: Some("Gift Wrap".to_string()),
            price: 100.0,
            quantity: 3,
        }];
        second.total = 300.0;
        second.status = OrderStatus::Confirmed;
        store.create(second).await.unwrap();

        let report = store
            .analytics_since(Utc::now() - chrono::Duration::days(30))
            .await
            .unwrap();

        assert_eq!(report.total_orders, 2);
        assert_eq!(report.total_revenue, 5300.0);
        assert_eq!(report.avg_order_value, 2650.0);
        assert_eq!(report.status_counts.get("pending"), Some(&1));
        assert_eq!(report.status_counts.get("confirmed"), Some(&1));
        assert_eq!(report.category_data.get("Shawls"), Some(&2));
        assert_eq!(report.category_data.get("Extras"), Some(&3));

        // Both orders landed today, so one daily bucket carries both
        assert_eq!(report.sales_by_date.len(), 1);
        let bucket = report.sales_by_date.values().next().unwrap();
        assert_eq!(bucket.orders, 2);
        assert_eq!(bucket.revenue, 5300.0);

        // Top products are ordered by revenue
        assert_eq!(report.top_products.len(), 2);
        assert_eq!(report.top_products[0].name, "Wool Shawl");
        assert_eq!(report.top_products[0].revenue, 5000.0);
        assert_eq!(report.top_products[1].quantity, 3);
    }

    #[tokio::test]
    async fn test_analytics_window_excludes_older_orders() {
        let (store, _catalog) = setup_with_catalog().await;
        store.create(sample_order()).await.unwrap();

        let report = store
            .analytics_since(Utc::now() + chrono::Duration::days(1))
            .await
            .unwrap();

        assert_eq!(report.total_orders, 0);
        assert_eq!(report.total_revenue, 0.0);
        assert_eq!(report.avg_order_value, 0.0);
        assert!(report.status_counts.is_empty());
        assert!(report.top_products.is_empty());
    }
}
