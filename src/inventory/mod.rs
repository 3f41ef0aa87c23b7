/// Inventory stock management
///
/// Checks, deducts, and restores quantity-on-hand for lists of
/// (product, quantity) pairs, and answers low-stock queries. Deduction
/// is an atomic conditional decrement so concurrent orders cannot
/// drive a product's quantity below zero.
use crate::error::{ApiError, ApiResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Remaining quantity at which a product counts as low stock
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// A stock operation input: product reference + requested quantity.
///
/// Items without a product reference (guest line items captured by name
/// only) are skipped by every operation.
#[derive(Debug, Clone, Deserialize)]
pub struct StockRequest {
    pub product_id: Option<String>,
    pub quantity: i64,
}

impl StockRequest {
    fn effective_quantity(&self) -> i64 {
        if self.quantity > 0 {
            self.quantity
        } else {
            1
        }
    }
}

/// Per-item availability failure
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheckError {
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<i64>,
}

/// Per-item low-stock warning (order would leave < threshold units)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheckWarning {
    pub product_id: String,
    pub product_name: String,
    pub message: String,
    pub remaining_after: i64,
}

/// Per-item stock snapshot taken during an availability check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLine {
    pub product_id: String,
    pub product_name: String,
    pub requested: i64,
    pub available: i64,
    pub sufficient: bool,
}

/// Result of an availability check; success iff no item failed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheck {
    pub success: bool,
    pub errors: Vec<StockCheckError>,
    pub warnings: Vec<StockCheckWarning>,
    pub stock_info: Vec<StockLine>,
}

/// Per-item deduction outcome
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDeduction {
    pub product_id: String,
    pub product_name: String,
    pub deducted: i64,
    pub remaining: i64,
    pub is_low_stock: bool,
}

/// Per-item restoration outcome
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRestoration {
    pub product_id: String,
    pub product_name: String,
    pub restored: i64,
    pub new_total: i64,
}

/// Per-item failure for deduct/restore
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockFailure {
    pub product_id: String,
    pub message: String,
}

/// Result of a stock deduction pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductReport {
    pub success: bool,
    pub updated: Vec<StockDeduction>,
    pub failed: Vec<StockFailure>,
}

/// Result of a stock restoration pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub success: bool,
    pub restored: Vec<StockRestoration>,
    pub failed: Vec<StockFailure>,
}

/// Severity tag for stock level reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockSeverity {
    #[serde(rename = "out-of-stock")]
    OutOfStock,
    #[serde(rename = "critical")]
    Critical,
    #[serde(rename = "low")]
    Low,
}

/// A product's stock level as reported by the low/out-of-stock queries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub id: String,
    pub name: String,
    pub sku: Option<String>,
    pub current_stock: i64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<StockSeverity>,
}

/// Stock management over the product catalog
pub struct InventoryManager {
    db: SqlitePool,
}

impl InventoryManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Check whether every requested item can be fulfilled.
    ///
    /// Advisory pre-flight: the structured errors and warnings feed the
    /// order API's response, but correctness under concurrency is
    /// enforced by `deduct`'s conditional decrement, not by this check.
    pub async fn check_availability(&self, items: &[StockRequest]) -> ApiResult<StockCheck> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut stock_info = Vec::new();

        for item in items {
            let Some(product_id) = &item.product_id else {
                continue;
            };

            let row = sqlx::query("SELECT name, qty FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&self.db)
                .await
                .map_err(ApiError::Database)?;

            let Some(row) = row else {
                errors.push(StockCheckError {
                    product_id: product_id.clone(),
                    product_name: None,
                    message: "Product not found".to_string(),
                    available: None,
                    requested: None,
                });
                continue;
            };

            let name: String = row.get("name");
            let available: i64 = row.get("qty");
            let requested = item.effective_quantity();

            stock_info.push(StockLine {
                product_id: product_id.clone(),
                product_name: name.clone(),
                requested,
                available,
                sufficient: available >= requested,
            });

            if available < requested {
                errors.push(StockCheckError {
                    product_id: product_id.clone(),
                    product_name: Some(name),
                    message: format!(
                        "Insufficient stock: only {} available, requested {}",
                        available, requested
                    ),
                    available: Some(available),
                    requested: Some(requested),
                });
            } else if available - requested < LOW_STOCK_THRESHOLD {
                let remaining_after = available - requested;
                warnings.push(StockCheckWarning {
                    product_id: product_id.clone(),
                    product_name: name,
                    message: format!(
                        "Low stock warning: only {} will remain after order",
                        remaining_after
                    ),
                    remaining_after,
                });
            }
        }

        Ok(StockCheck {
            success: errors.is_empty(),
            errors,
            warnings,
            stock_info,
        })
    }

    /// Deduct quantity-on-hand for each item.
    ///
    /// Each decrement is conditional (`qty >= requested`), so a product
    /// can never be driven negative; a concurrent order that loses the
    /// race gets a per-item insufficient-stock failure instead.
    pub async fn deduct(&self, items: &[StockRequest]) -> ApiResult<DeductReport> {
        let mut updated = Vec::new();
        let mut failed = Vec::new();

        for item in items {
            let Some(product_id) = &item.product_id else {
                continue;
            };
            let quantity = item.effective_quantity();

            let result = sqlx::query(
                "UPDATE products SET qty = qty - ?1, updated_at = ?2
                 WHERE id = ?3 AND qty >= ?1",
            )
            .bind(quantity)
            .bind(Utc::now())
            .bind(product_id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

            if result.rows_affected() == 0 {
                // Distinguish a missing product from an insufficient one
                let row = sqlx::query("SELECT qty FROM products WHERE id = ?1")
                    .bind(product_id)
                    .fetch_optional(&self.db)
                    .await
                    .map_err(ApiError::Database)?;

                let message = match row {
                    None => "Product not found".to_string(),
                    Some(row) => {
                        let available: i64 = row.get("qty");
                        format!(
                            "Insufficient stock: only {} available, requested {}",
                            available, quantity
                        )
                    }
                };
                failed.push(StockFailure {
                    product_id: product_id.clone(),
                    message,
                });
                continue;
            }

            let row = sqlx::query("SELECT name, qty FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_one(&self.db)
                .await
                .map_err(ApiError::Database)?;

            let name: String = row.get("name");
            let remaining: i64 = row.get("qty");

            tracing::info!(
                "Stock updated: {} -{} (remaining: {})",
                name,
                quantity,
                remaining
            );

            updated.push(StockDeduction {
                product_id: product_id.clone(),
                product_name: name,
                deducted: quantity,
                remaining,
                is_low_stock: remaining < LOW_STOCK_THRESHOLD,
            });
        }

        Ok(DeductReport {
            success: failed.is_empty(),
            updated,
            failed,
        })
    }

    /// Restore quantity-on-hand for each item (order cancellation)
    pub async fn restore(&self, items: &[StockRequest]) -> ApiResult<RestoreReport> {
        let mut restored = Vec::new();
        let mut failed = Vec::new();

        for item in items {
            let Some(product_id) = &item.product_id else {
                continue;
            };
            let quantity = item.effective_quantity();

            let result = sqlx::query(
                "UPDATE products SET qty = qty + ?1, updated_at = ?2 WHERE id = ?3",
            )
            .bind(quantity)
            .bind(Utc::now())
            .bind(product_id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

            if result.rows_affected() == 0 {
                failed.push(StockFailure {
                    product_id: product_id.clone(),
                    message: "Product not found".to_string(),
                });
                continue;
            }

            let row = sqlx::query("SELECT name, qty FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_one(&self.db)
                .await
                .map_err(ApiError::Database)?;

            let name: String = row.get("name");
            let new_total: i64 = row.get("qty");

            tracing::info!(
                "Stock restored: {} +{} (new total: {})",
                name,
                quantity,
                new_total
            );

            restored.push(StockRestoration {
                product_id: product_id.clone(),
                product_name: name,
                restored: quantity,
                new_total,
            });
        }

        Ok(RestoreReport {
            success: failed.is_empty(),
            restored,
            failed,
        })
    }

    /// Products with quantity under the given threshold, tagged by severity
    pub async fn low_stock(&self, threshold: i64) -> ApiResult<Vec<StockLevel>> {
        let rows = sqlx::query(
            "SELECT id, name, sku, qty, price FROM products WHERE qty < ?1 ORDER BY qty ASC",
        )
        .bind(threshold)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(rows
            .iter()
            .map(|row| {
                let qty: i64 = row.get("qty");
                let severity = if qty <= 0 {
                    StockSeverity::OutOfStock
                } else if qty < LOW_STOCK_THRESHOLD {
                    StockSeverity::Critical
                } else {
                    StockSeverity::Low
                };

                StockLevel {
                    id: row.get("id"),
                    name: row.get("name"),
                    sku: row.get("sku"),
                    current_stock: qty,
                    price: row.get("price"),
                    severity: Some(severity),
                }
            })
            .collect())
    }

    /// Products at or below zero quantity
    pub async fn out_of_stock(&self) -> ApiResult<Vec<StockLevel>> {
        let rows = sqlx::query(
            "SELECT id, name, sku, qty, price FROM products WHERE qty <= 0 ORDER BY qty ASC",
        )
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(rows
            .iter()
            .map(|row| StockLevel {
                id: row.get("id"),
                name: row.get("name"),
                sku: row.get("sku"),
                current_stock: row.get("qty"),
                price: row.get("price"),
                severity: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{create_test_tables, NewProduct, ProductCatalog};

    async fn setup() -> (InventoryManager, ProductCatalog, SqlitePool) {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        create_test_tables(&db).await;
        (
            InventoryManager::new(db.clone()),
            ProductCatalog::new(db.clone()),
            db,
        )
    }

    async fn seed_product(catalog: &ProductCatalog, name: &str, qty: i64) -> String {
        catalog
            .create(NewProduct {
                name: name.to_string(),
                price: 1000.0,
                qty,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    fn request(product_id: &str, quantity: i64) -> StockRequest {
        StockRequest {
            product_id: Some(product_id.to_string()),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_check_reports_shortfall() {
        let (inventory, catalog, _db) = setup().await;
        let id = seed_product(&catalog, "Shawl", 2).await;

        let check = inventory
            .check_availability(&[request(&id, 5)])
            .await
            .unwrap();

        assert!(!check.success);
        assert_eq!(check.errors.len(), 1);
        assert_eq!(check.errors[0].available, Some(2));
        assert_eq!(check.errors[0].requested, Some(5));
        assert!(!check.stock_info[0].sufficient);
    }

    #[tokio::test]
    async fn test_check_warns_on_low_remaining() {
        let (inventory, catalog, _db) = setup().await;
        let id = seed_product(&catalog, "Shawl", 6).await;

        let check = inventory
            .check_availability(&[request(&id, 3)])
            .await
            .unwrap();

        assert!(check.success);
        assert!(check.errors.is_empty());
        assert_eq!(check.warnings.len(), 1);
        assert_eq!(check.warnings[0].remaining_after, 3);
    }

    #[tokio::test]
    async fn test_check_skips_items_without_product() {
        let (inventory, _catalog, _db) = setup().await;

        let check = inventory
            .check_availability(&[StockRequest {
                product_id: None,
                quantity: 3,
            }])
            .await
            .unwrap();

        assert!(check.success);
        assert!(check.stock_info.is_empty());
    }

    #[tokio::test]
    async fn test_deduct_restore_round_trip() {
        let (inventory, catalog, _db) = setup().await;
        let id = seed_product(&catalog, "Shawl", 10).await;
        let items = [request(&id, 3)];

        let deducted = inventory.deduct(&items).await.unwrap();
        assert!(deducted.success);
        assert_eq!(deducted.updated[0].remaining, 7);

        let restored = inventory.restore(&items).await.unwrap();
        assert!(restored.success);
        assert_eq!(restored.restored[0].new_total, 10);

        assert_eq!(catalog.get(&id).await.unwrap().unwrap().qty, 10);
    }

    #[tokio::test]
    async fn test_deduct_flags_low_stock() {
        let (inventory, catalog, _db) = setup().await;
        let id = seed_product(&catalog, "Shawl", 6).await;

        let report = inventory.deduct(&[request(&id, 2)]).await.unwrap();
        assert_eq!(report.updated[0].remaining, 4);
        assert!(report.updated[0].is_low_stock);
    }

    #[tokio::test]
    async fn test_deduct_refuses_oversell() {
        let (inventory, catalog, _db) = setup().await;
        let id = seed_product(&catalog, "Shawl", 5).await;

        // Two orders for the full quantity: the first wins, the second
        // must fail instead of driving stock negative
        let first = inventory.deduct(&[request(&id, 5)]).await.unwrap();
        assert!(first.success);
        assert_eq!(first.updated[0].remaining, 0);

        let second = inventory.deduct(&[request(&id, 5)]).await.unwrap();
        assert!(!second.success);
        assert_eq!(second.failed.len(), 1);
        assert!(second.failed[0].message.contains("Insufficient stock"));

        assert_eq!(catalog.get(&id).await.unwrap().unwrap().qty, 0);
    }

    #[tokio::test]
    async fn test_deduct_missing_product() {
        let (inventory, _catalog, _db) = setup().await;

        let report = inventory.deduct(&[request("no-such-id", 1)]).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.failed[0].message, "Product not found");
    }

    #[tokio::test]
    async fn test_zero_quantity_treated_as_one() {
        let (inventory, catalog, _db) = setup().await;
        let id = seed_product(&catalog, "Shawl", 10).await;

        let report = inventory.deduct(&[request(&id, 0)]).await.unwrap();
        assert_eq!(report.updated[0].deducted, 1);
        assert_eq!(report.updated[0].remaining, 9);
    }

    #[tokio::test]
    async fn test_low_stock_severities() {
        let (inventory, catalog, _db) = setup().await;
        seed_product(&catalog, "Gone", 0).await;
        seed_product(&catalog, "Nearly", 2).await;
        seed_product(&catalog, "Thin", 8).await;
        seed_product(&catalog, "Plenty", 50).await;

        let report = inventory.low_stock(10).await.unwrap();
        assert_eq!(report.len(), 3);

        let by_name = |name: &str| {
            report
                .iter()
                .find(|l| l.name == name)
                .map(|l| l.severity.unwrap())
        };
        assert_eq!(by_name("Gone"), Some(StockSeverity::OutOfStock));
        assert_eq!(by_name("Nearly"), Some(StockSeverity::Critical));
        assert_eq!(by_name("Thin"), Some(StockSeverity::Low));
        assert_eq!(by_name("Plenty"), None);

        let out = inventory.out_of_stock().await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Gone");
    }
}
