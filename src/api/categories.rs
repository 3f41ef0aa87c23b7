/// Category endpoints
use crate::{
    auth::AdminUser,
    catalog::Category,
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

/// Build category routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", axum::routing::delete(delete_category))
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
}

/// Public: list categories sorted by name
async fn list_categories(State(ctx): State<AppContext>) -> ApiResult<Json<Vec<Category>>> {
    let categories = ctx.catalog.list_categories().await?;
    Ok(Json(categories))
}

/// Admin: create a category; returns the existing one on a name match
async fn create_category(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
    Json(req): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = ctx.catalog.create_category(&req.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Admin: delete a category
async fn delete_category(
    _admin: AdminUser,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !ctx.catalog.delete_category(&id).await? {
        return Err(ApiError::NotFound("Not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
