//! Read-only projection of the product catalog.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};

use crate::error::Result;

/// Catalog item as exposed to clients.
#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub brand: Option<String>,
    pub retail_price: Option<f64>,
}

/// Lookup of catalog items by id.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Whether `item_id` exists.
    async fn exists(&self, item_id: &str) -> Result<bool>;

    /// Ids among `item_ids` that do not exist, in request order.
    async fn missing(&self, item_ids: &[String]) -> Result<Vec<String>>;

    /// Items for `item_ids`, in request order. Unknown ids are skipped.
    async fn fetch(&self, item_ids: &[String]) -> Result<Vec<Item>>;
}

/// Reorder `items` following `ids`.
pub(crate) fn in_request_order(ids: &[String], items: Vec<Item>) -> Vec<Item> {
    let mut by_id: HashMap<String, Item> =
        items.into_iter().map(|item| (item.id.clone(), item)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// [`Catalog`] reading the `products` table.
#[derive(Clone)]
pub struct PgCatalog {
    pool: Pool<Postgres>,
}

impl PgCatalog {
    /// Create a new [`PgCatalog`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn exists(&self, item_id: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(item_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn missing(&self, item_ids: &[String]) -> Result<Vec<String>> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        let missing = sqlx::query_scalar::<_, String>(
            r#"SELECT requested.id
                FROM UNNEST($1::text[]) WITH ORDINALITY AS requested(id, position)
                WHERE NOT EXISTS (SELECT 1 FROM products p WHERE p.id = requested.id)
                ORDER BY requested.position"#,
        )
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(missing)
    }

    async fn fetch(&self, item_ids: &[String]) -> Result<Vec<Item>> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = sqlx::query_as::<_, Item>(
            "SELECT id, title, brand, retail_price FROM products WHERE id = ANY($1)",
        )
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(in_request_order(item_ids, items))
    }
}
