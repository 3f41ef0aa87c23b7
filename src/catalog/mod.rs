/// Product catalog and category reference data
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// A catalog product with quantity-on-hand
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub images: Vec<String>,
    pub qty: i64,
    pub sku: Option<String>,
    pub sizes: Vec<i64>,
    pub colors: Vec<String>,
    pub category: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a product
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub qty: i64,
    pub sku: Option<String>,
    #[serde(default)]
    pub sizes: Vec<i64>,
    #[serde(default)]
    pub colors: Vec<String>,
    pub category: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update of a product; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub images: Option<Vec<String>>,
    pub qty: Option<i64>,
    pub sku: Option<String>,
    pub sizes: Option<Vec<i64>>,
    pub colors: Option<Vec<String>>,
    pub category: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Category reference data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Derive a URL slug from a category name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true; // suppress leading dash

    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    slug.trim_end_matches('-').to_string()
}

/// Persistence for products and categories
pub struct ProductCatalog {
    db: SqlitePool,
}

impl ProductCatalog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// List products, newest first
    pub async fn list(&self, limit: i64) -> ApiResult<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT id, name, description, price, images, qty, sku, sizes, colors,
                    category, metadata, created_at, updated_at
             FROM products ORDER BY created_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(rows.iter().map(Self::product_from_row).collect())
    }

    /// Get a single product
    pub async fn get(&self, id: &str) -> ApiResult<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, description, price, images, qty, sku, sizes, colors,
                    category, metadata, created_at, updated_at
             FROM products WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(row.as_ref().map(Self::product_from_row))
    }

    /// Create a product
    pub async fn create(&self, new: NewProduct) -> ApiResult<Product> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO products (id, name, description, price, images, qty, sku, sizes,
                                   colors, category, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(serde_json::to_string(&new.images).unwrap_or_else(|_| "[]".to_string()))
        .bind(new.qty)
        .bind(&new.sku)
        .bind(serde_json::to_string(&new.sizes).unwrap_or_else(|_| "[]".to_string()))
        .bind(serde_json::to_string(&new.colors).unwrap_or_else(|_| "[]".to_string()))
        .bind(&new.category)
        .bind(new.metadata.as_ref().map(|m| m.to_string()))
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        self.get(&id)
            .await?
            .ok_or_else(|| ApiError::Internal("Product not found after insert".to_string()))
    }

    /// Apply a partial update; returns None if the product does not exist
    pub async fn update(&self, id: &str, patch: ProductPatch) -> ApiResult<Option<Product>> {
        let Some(existing) = self.get(id).await? else {
            return Ok(None);
        };

        let name = patch.name.unwrap_or(existing.name);
        let description = patch.description.or(existing.description);
        let price = patch.price.unwrap_or(existing.price);
        let images = patch.images.unwrap_or(existing.images);
        let qty = patch.qty.unwrap_or(existing.qty);
        let sku = patch.sku.or(existing.sku);
        let sizes = patch.sizes.unwrap_or(existing.sizes);
        let colors = patch.colors.unwrap_or(existing.colors);
        let category = patch.category.or(existing.category);
        let metadata = patch.metadata.or(existing.metadata);

        sqlx::query(
            "UPDATE products SET name = ?1, description = ?2, price = ?3, images = ?4,
                    qty = ?5, sku = ?6, sizes = ?7, colors = ?8, category = ?9,
                    metadata = ?10, updated_at = ?11
             WHERE id = ?12",
        )
        .bind(&name)
        .bind(&description)
        .bind(price)
        .bind(serde_json::to_string(&images).unwrap_or_else(|_| "[]".to_string()))
        .bind(qty)
        .bind(&sku)
        .bind(serde_json::to_string(&sizes).unwrap_or_else(|_| "[]".to_string()))
        .bind(serde_json::to_string(&colors).unwrap_or_else(|_| "[]".to_string()))
        .bind(&category)
        .bind(metadata.as_ref().map(|m| m.to_string()))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        self.get(id).await
    }

    /// Delete a product; returns whether a row was removed
    pub async fn delete(&self, id: &str) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// List categories sorted by name
    pub async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, name, slug, created_at FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(rows.iter().map(Self::category_from_row).collect())
    }

    /// Create a category; an existing name returns the existing row
    pub async fn create_category(&self, name: &str) -> ApiResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("Name required".to_string()));
        }

        let existing = sqlx::query(
            "SELECT id, name, slug, created_at FROM categories WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?;

        if let Some(row) = existing {
            return Ok(Self::category_from_row(&row));
        }

        let id = Uuid::new_v4().to_string();
        let slug = slugify(name);
        let now = Utc::now();

        sqlx::query("INSERT INTO categories (id, name, slug, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&id)
            .bind(name)
            .bind(&slug)
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(Category {
            id,
            name: name.to_string(),
            slug: Some(slug),
            created_at: now,
        })
    }

    /// Delete a category; returns whether a row was removed
    pub async fn delete_category(&self, id: &str) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    fn product_from_row(row: &SqliteRow) -> Product {
        let images: String = row.get("images");
        let sizes: String = row.get("sizes");
        let colors: String = row.get("colors");
        let metadata: Option<String> = row.get("metadata");

        Product {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            price: row.get("price"),
            images: serde_json::from_str(&images).unwrap_or_default(),
            qty: row.get("qty"),
            sku: row.get("sku"),
            sizes: serde_json::from_str(&sizes).unwrap_or_default(),
            colors: serde_json::from_str(&colors).unwrap_or_default(),
            category: row.get("category"),
            metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn category_from_row(row: &SqliteRow) -> Category {
        Category {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            created_at: row.get("created_at"),
        }
    }
}

#[cfg(test)]
pub(crate) async fn create_test_tables(db: &SqlitePool) {
    sqlx::query(
        r#"
        CREATE TABLE products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            price REAL NOT NULL DEFAULT 0,
            images TEXT NOT NULL DEFAULT '[]',
            qty INTEGER NOT NULL DEFAULT 0,
            sku TEXT,
            sizes TEXT NOT NULL DEFAULT '[]',
            colors TEXT NOT NULL DEFAULT '[]',
            category TEXT,
            metadata TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(db)
    .await
    .unwrap();

    sqlx::query(
        r#"
        CREATE TABLE categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            slug TEXT,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(db)
    .await
    .unwrap();
}
