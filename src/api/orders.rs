/// Order endpoints: checkout, listings, status lifecycle
use crate::{
    auth::{AdminUser, AuthUser, OptionalAuthUser},
    context::AppContext,
    error::{ApiError, ApiResult},
    inventory::InventoryManager,
    mailer::Mailer,
    orders::{
        stock_requests, NewOrder, Order, OrderItem, OrderStatus, OrderStore, ShippingAddress,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Build order routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/", get(list_all_orders).post(create_order))
        .route("/all", get(list_recent_orders))
        .route("/my", get(list_my_orders))
        .route("/analytics/stats", get(analytics_stats))
        .route("/webhook/status-update", post(webhook_status_update))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_info: Option<serde_json::Value>,
    pub order_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order: Order,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusWebhookRequest {
    pub order_number: Option<String>,
    pub status: Option<String>,
    pub tracking_number: Option<String>,
    pub webhook_secret: Option<String>,
}

/// Orders service health: verifies the database answers a count
async fn health(State(ctx): State<AppContext>) -> Response {
    match ctx.orders.count().await {
        Ok(total) => Json(json!({
            "success": true,
            "message": "Orders service is healthy",
            "database": "connected",
            "totalOrders": total,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Orders service is unhealthy",
                    "database": "disconnected",
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
                .into_response()
        }
    }
}

/// Create an order. Guest checkout is allowed; an authenticated user is
/// associated with the order when a token is present.
async fn create_order(
    OptionalAuthUser { user }: OptionalAuthUser,
    State(ctx): State<AppContext>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<Json<CreateOrderResponse>> {
    let requests = stock_requests(&req.items);

    let check = ctx.inventory.check_availability(&requests).await?;
    if !check.success {
        return Err(ApiError::InsufficientStock {
            details: json!({
                "errors": check.errors,
                "stockInfo": check.stock_info,
            }),
        });
    }
    if !check.warnings.is_empty() {
        tracing::warn!("Low stock warnings: {:?}", check.warnings);
    }

    // Totals trust the submitted line items; prices are snapshots, not
    // re-read from the catalog
    let total: f64 = req
        .items
        .iter()
        .map(|item| item.price * item.quantity.max(1) as f64)
        .sum();

    let order = ctx
        .orders
        .create(NewOrder {
            user_id: user.map(|u| u.id),
            order_number: req.order_number,
            items: req.items,
            total,
            status: OrderStatus::Pending,
            shipping_address: req.shipping_address,
            payment_info: req.payment_info,
            payment_session_id: None,
        })
        .await?;

    // Deduction failures do not undo the already-created order
    match ctx.inventory.deduct(&stock_requests(&order.items)).await {
        Ok(result) => {
            if !result.failed.is_empty() {
                tracing::warn!("Some products failed to update stock: {:?}", result.failed);
            }
            let low: Vec<_> = result.updated.iter().filter(|u| u.is_low_stock).collect();
            if !low.is_empty() {
                tracing::warn!("Low stock after order: {:?}", low);
            }
        }
        Err(e) => tracing::error!("Stock deduction failed: {}", e),
    }

    let mut order = order;
    let customer_email = order
        .shipping_address
        .as_ref()
        .map(|a| a.email.clone())
        .filter(|e| e.contains('@'));

    if let Some(email) = customer_email {
        if let Err(e) = ctx.mailer.send_order_confirmation(&order, &email).await {
            tracing::error!("Email notification failed: {}", e);
        }
        // Mark as sent when delivery was attempted
        ctx.orders.mark_email_sent(&order.id).await?;
        order.email_sent = true;
    }

    Ok(Json(CreateOrderResponse {
        success: true,
        order,
        message: "Order created successfully".to_string(),
    }))
}

/// Public: most recent orders
async fn list_recent_orders(State(ctx): State<AppContext>) -> ApiResult<Json<serde_json::Value>> {
    let orders = ctx.orders.list_recent(50).await?;
    Ok(Json(json!({
        "success": true,
        "count": orders.len(),
        "orders": orders,
    })))
}

/// Authenticated user's own orders
async fn list_my_orders(
    AuthUser { user }: AuthUser,
    State(ctx): State<AppContext>,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = ctx.orders.list_for_user(&user.id).await?;
    Ok(Json(orders))
}

/// Admin: list all orders
async fn list_all_orders(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = ctx.orders.list_recent(500).await?;
    Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
}

/// Window start for a named reporting period. Unknown values fall back
/// to the 30-day default.
fn period_start(period: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        "7days" => now - Duration::days(7),
        "90days" => now - Duration::days(90),
        "12months" => now - Duration::days(365),
        "all" => DateTime::<Utc>::UNIX_EPOCH,
        _ => now - Duration::days(30),
    }
}

/// Admin: revenue, status, and product rollups for the dashboard
async fn analytics_stats(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let period = query.period.unwrap_or_else(|| "30days".to_string());
    let now = Utc::now();
    let start = period_start(&period, now);

    let analytics = ctx.orders.analytics_since(start).await?;

    Ok(Json(json!({
        "success": true,
        "period": period,
        "startDate": start.to_rfc3339(),
        "endDate": now.to_rfc3339(),
        "analytics": analytics,
    })))
}

/// Admin: fetch a specific order
async fn get_order(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = ctx
        .orders
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    Ok(Json(order))
}

/// Shared status transition: restore stock when entering canceled, then
/// persist and notify
async fn transition_status(
    orders: &OrderStore,
    inventory: &InventoryManager,
    mailer: &Mailer,
    current: &Order,
    new_status: OrderStatus,
    tracking_number: Option<&str>,
) -> ApiResult<Order> {
    let old_status = current.status;

    if new_status == OrderStatus::Canceled && old_status != OrderStatus::Canceled {
        tracing::info!("Restoring stock for canceled order {}", current.order_number);
        match inventory.restore(&stock_requests(&current.items)).await {
            Ok(result) if result.success => {
                tracing::info!("Stock restored for {} products", result.restored.len());
            }
            Ok(result) => {
                tracing::warn!("Some products failed to restore: {:?}", result.failed);
            }
            Err(e) => tracing::error!("Stock restore failed: {}", e),
        }
    }

    let order = orders
        .update_status(&current.id, new_status, tracking_number)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    if old_status != new_status {
        if let Some(email) = current.shipping_address.as_ref().map(|a| a.email.as_str()) {
            if let Err(e) = mailer
                .send_order_status_update(&order, email, old_status, new_status)
                .await
            {
                tracing::error!("Failed to send status update email: {}", e);
            } else {
                tracing::info!(
                    "Status update email sent for order {}: {} to {}",
                    order.order_number,
                    old_status,
                    new_status
                );
            }
        }
    }

    Ok(order)
}

fn parse_status(raw: Option<&str>) -> ApiResult<OrderStatus> {
    let raw = raw.ok_or_else(|| ApiError::Validation("Status required".to_string()))?;
    OrderStatus::parse(raw)
        .ok_or_else(|| ApiError::Validation(format!("Invalid order status: {}", raw)))
}

/// Admin: update order status
async fn update_order_status(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Order>> {
    let new_status = parse_status(req.status.as_deref())?;

    let current = ctx
        .orders
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    let order = transition_status(
        &ctx.orders,
        &ctx.inventory,
        &ctx.mailer,
        &current,
        new_status,
        None,
    )
    .await?;
    Ok(Json(order))
}

/// Shared-secret webhook for automated status updates (e.g. shipping
/// providers), keyed by order number
async fn webhook_status_update(
    State(ctx): State<AppContext>,
    Json(req): Json<StatusWebhookRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(expected) = &ctx.config.webhooks.order_status_secret {
        if req.webhook_secret.as_deref() != Some(expected.as_str()) {
            return Err(ApiError::Authentication("Invalid webhook secret".to_string()));
        }
    }

    let order_number = req.order_number.filter(|n| !n.is_empty()).ok_or_else(|| {
        ApiError::Validation("orderNumber and status are required".to_string())
    })?;
    let new_status = parse_status(req.status.as_deref())?;

    let current = ctx
        .orders
        .get_by_number(&order_number)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    let old_status = current.status;
    let order = transition_status(
        &ctx.orders,
        &ctx.inventory,
        &ctx.mailer,
        &current,
        new_status,
        req.tracking_number.as_deref(),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "order": {
            "orderNumber": order.order_number,
            "oldStatus": old_status,
            "newStatus": new_status,
            "emailSent": current.shipping_address.is_some(),
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewProduct, ProductCatalog};
    use crate::config::EmailSettings;
    use sqlx::SqlitePool;

    struct Fixture {
        orders: OrderStore,
        inventory: InventoryManager,
        catalog: ProductCatalog,
        mailer: Mailer,
    }

    async fn setup() -> Fixture {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        crate::catalog::create_test_tables(&db).await;
        crate::orders::create_test_tables(&db).await;

        Fixture {
            orders: OrderStore::new(db.clone()),
            inventory: InventoryManager::new(db.clone()),
            catalog: ProductCatalog::new(db),
            mailer: Mailer::new(EmailSettings {
                send: false,
                smtp: None,
            })
            .unwrap(),
        }
    }

    async fn place_order(fx: &Fixture, product_id: &str, quantity: i64) -> Order {
        let order = fx
            .orders
            .create(NewOrder {
                user_id: None,
                order_number: None,
                items: vec![OrderItem {
                    product_id: Some(product_id.to_string()),
                    name: Some("Wool Shawl".to_string()),
                    price: 2500.0,
                    quantity,
                }],
                total: 2500.0 * quantity as f64,
                status: OrderStatus::Pending,
                shipping_address: Some(ShippingAddress {
                    full_name: "Amira Khan".to_string(),
                    email: "amira@example.com".to_string(),
                    phone: None,
                    address: "12 Mall Road".to_string(),
                    city: "Lahore".to_string(),
                    postal: "54000".to_string(),
                    country: "PK".to_string(),
                }),
                payment_info: None,
                payment_session_id: None,
            })
            .await
            .unwrap();

        fx.inventory
            .deduct(&stock_requests(&order.items))
            .await
            .unwrap();

        order
    }

    async fn stock_of(fx: &Fixture, product_id: &str) -> i64 {
        fx.catalog.get(product_id).await.unwrap().unwrap().qty
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_exactly_once() {
        let fx = setup().await;
        let product = fx
            .catalog
            .create(NewProduct {
                name: "Wool Shawl".to_string(),
                price: 2500.0,
                qty: 10,
                ..Default::default()
            })
            .await
            .unwrap();

        let order = place_order(&fx, &product.id, 3).await;
        assert_eq!(stock_of(&fx, &product.id).await, 7);

        let canceled = transition_status(
            &fx.orders,
            &fx.inventory,
            &fx.mailer,
            &order,
            OrderStatus::Canceled,
            None,
        )
        .await
        .unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert_eq!(stock_of(&fx, &product.id).await, 10);

        // Canceling an already-canceled order must not restore again
        let again = transition_status(
            &fx.orders,
            &fx.inventory,
            &fx.mailer,
            &canceled,
            OrderStatus::Canceled,
            None,
        )
        .await
        .unwrap();
        assert_eq!(again.status, OrderStatus::Canceled);
        assert_eq!(stock_of(&fx, &product.id).await, 10);
    }

    #[tokio::test]
    async fn test_non_cancel_transitions_leave_stock_alone() {
        let fx = setup().await;
        let product = fx
            .catalog
            .create(NewProduct {
                name: "Wool Shawl".to_string(),
                price: 2500.0,
                qty: 10,
                ..Default::default()
            })
            .await
            .unwrap();

        let order = place_order(&fx, &product.id, 3).await;

        let shipped = transition_status(
            &fx.orders,
            &fx.inventory,
            &fx.mailer,
            &order,
            OrderStatus::Shipped,
            Some("TRK-42"),
        )
        .await
        .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert_eq!(shipped.tracking_number.as_deref(), Some("TRK-42"));
        assert_eq!(stock_of(&fx, &product.id).await, 7);
    }

    #[test]
    fn test_period_start_windows() {
        let now = Utc::now();

        assert_eq!(period_start("7days", now), now - Duration::days(7));
        assert_eq!(period_start("30days", now), now - Duration::days(30));
        assert_eq!(period_start("90days", now), now - Duration::days(90));
        assert_eq!(period_start("12months", now), now - Duration::days(365));
        assert_eq!(period_start("all", now), DateTime::<Utc>::UNIX_EPOCH);

        // Unknown periods fall back to 30 days
        assert_eq!(period_start("yesterday", now), now - Duration::days(30));
    }
}
