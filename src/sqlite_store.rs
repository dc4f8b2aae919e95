//! SQLite-backed [`ItemStore`] implementation.
//!
//! Each item is one row of the `items` table keyed by its string id. Listing
//! and search return rows in rowid (insertion) order.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use item_rag_core::models::{generate_id, Item, ItemField, ItemInDb};
use item_rag_core::store::{ItemStore, StoreError, StoreResult, SubstringMatch};

/// SQLite implementation of the [`ItemStore`] trait.
///
/// Holds a [`SqlitePool`] for the lifetime of the server; the pool is shared
/// by all request handlers.
pub struct SqliteItemStore {
    pool: SqlitePool,
}

impl SqliteItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn row_to_item(row: &SqliteRow) -> ItemInDb {
    ItemInDb {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        price: row.get("price"),
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn find_all(&self, limit: usize) -> StoreResult<Vec<ItemInDb>> {
        let rows =
            sqlx::query("SELECT id, name, description, price FROM items ORDER BY rowid LIMIT ?")
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(rows.iter().map(row_to_item).collect())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<ItemInDb> {
        let row = sqlx::query("SELECT id, name, description, price FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.as_ref()
            .map(row_to_item)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn find_by_substring(
        &self,
        field: ItemField,
        pattern: &str,
        case_insensitive: bool,
        limit: usize,
    ) -> StoreResult<Vec<ItemInDb>> {
        // `field` maps to a fixed column name, never user input.
        let column = field.as_str();

        if !case_insensitive {
            let sql = format!(
                "SELECT id, name, description, price FROM items \
                 WHERE instr({column}, ?) > 0 ORDER BY rowid LIMIT ?"
            );
            let rows = sqlx::query(&sql)
                .bind(pattern)
                .bind(sql_limit(limit))
                .fetch_all(&self.pool)
                .await
                .map_err(unavailable)?;
            return Ok(rows.iter().map(row_to_item).collect());
        }

        // SQLite's lower() folds ASCII only, so case-insensitive matching
        // runs in Rust with the same folding as every other backend.
        let matcher = SubstringMatch::new(pattern, true);
        let rows = sqlx::query("SELECT id, name, description, price FROM items ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(rows
            .iter()
            .map(row_to_item)
            .filter(|item| matcher.is_match(field.value(item)))
            .take(limit)
            .collect())
    }

    async fn insert(&self, item: &Item, id: Option<&str>) -> StoreResult<ItemInDb> {
        let id = id.map(str::to_string).unwrap_or_else(generate_id);
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO items (id, name, description, price, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(ItemInDb::new(id, item.clone())),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::Duplicate(id))
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn replace(&self, id: &str, item: &Item) -> StoreResult<ItemInDb> {
        let row = sqlx::query(
            r#"
            UPDATE items SET name = ?, description = ?, price = ?
            WHERE id = ?
            RETURNING id, name, description, price
            "#,
        )
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.as_ref()
            .map(row_to_item)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<ItemInDb> {
        let row =
            sqlx::query("DELETE FROM items WHERE id = ? RETURNING id, name, description, price")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        row.as_ref()
            .map(row_to_item)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
