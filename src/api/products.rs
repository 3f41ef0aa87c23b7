/// Product catalog endpoints
use crate::{
    auth::AdminUser,
    catalog::{NewProduct, Product, ProductPatch},
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

/// Public listing cap
const LIST_LIMIT: i64 = 200;

/// Threshold for the admin stock report; wider than the per-order
/// warning cutoff so restocking is flagged early
const STOCK_REPORT_THRESHOLD: i64 = 10;

/// Build product routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/inventory/status", get(inventory_status))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Public: list products
async fn list_products(State(ctx): State<AppContext>) -> ApiResult<Json<Vec<Product>>> {
    let products = ctx.catalog.list(LIST_LIMIT).await?;
    Ok(Json(products))
}

/// Public: get a single product
async fn get_product(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    let product = ctx
        .catalog
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Not found".to_string()))?;
    Ok(Json(product))
}

/// Admin: create a product
async fn create_product(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
    Json(new_product): Json<NewProduct>,
) -> ApiResult<Json<Product>> {
    let product = ctx.catalog.create(new_product).await?;
    tracing::info!("Product created: {} ({})", product.name, product.id);
    Ok(Json(product))
}

/// Admin: update a product
async fn update_product(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> ApiResult<Json<Product>> {
    let product = ctx
        .catalog
        .update(&id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Not found".to_string()))?;
    Ok(Json(product))
}

/// Admin: stock report listing products that are low or out of stock
async fn inventory_status(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
) -> ApiResult<Json<serde_json::Value>> {
    let low_stock = ctx.inventory.low_stock(STOCK_REPORT_THRESHOLD).await?;
    let out_of_stock = ctx.inventory.out_of_stock().await?;

    Ok(Json(json!({
        "success": true,
        "lowStockCount": low_stock.len(),
        "lowStockProducts": low_stock,
        "outOfStockCount": out_of_stock.len(),
        "outOfStockProducts": out_of_stock,
    })))
}

/// Admin: delete a product
async fn delete_product(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<OkResponse>> {
    ctx.catalog.delete(&id).await?;
    Ok(Json(OkResponse { ok: true }))
}
