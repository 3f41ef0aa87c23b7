/// API routes and handlers
pub mod auth;
pub mod categories;
pub mod orders;
pub mod payments;
pub mod products;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/products", products::routes())
        .nest("/api/categories", categories::routes())
        .nest("/api/orders", orders::routes())
        .nest("/api/payments", payments::routes())
}
