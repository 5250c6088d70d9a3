use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::codec;
use crate::models::{AppId, Categories};

pub async fn init_db(database_url: &str) -> Result<PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(database_url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("run migrations")?;

    Ok(pool)
}

/// Durable tier for game categories, shared by every process using the same database.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Ids without a stored row are left out of the result.
    async fn query_categories(&self, app_ids: &[AppId]) -> Result<HashMap<AppId, Categories>>;

    /// Inserts every entry or none of them. Saving an id that is already
    /// stored is an error.
    async fn save_categories(&self, categories: &HashMap<AppId, Categories>) -> Result<()>;
}

#[derive(Clone)]
pub struct PgCategoryStore {
    pool: PgPool,
}

impl PgCategoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryStore for PgCategoryStore {
    async fn query_categories(&self, app_ids: &[AppId]) -> Result<HashMap<AppId, Categories>> {
        let mut categories = HashMap::with_capacity(app_ids.len());
        if app_ids.is_empty() {
            return Ok(categories);
        }

        // dropping an uncommitted transaction rolls it back
        let mut tx = self.pool.begin().await.context("begin transaction")?;

        let ids: Vec<i64> = app_ids.iter().map(|&id| i64::from(id)).collect();
        let rows = sqlx::query("SELECT appid, categories FROM game_categories WHERE appid = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *tx)
            .await
            .with_context(|| format!("query categories (appids={:?})", app_ids))?;

        for row in rows {
            let app_id: i64 = row.try_get("appid").context("read stored appid")?;
            let encoded: Vec<u8> = row
                .try_get("categories")
                .with_context(|| format!("read stored categories (appid={})", app_id))?;
            let app_id = AppId::try_from(app_id)
                .with_context(|| format!("stored appid out of range: {}", app_id))?;

            categories.insert(app_id, codec::decode(&encoded));
        }

        tx.commit().await.context("commit transaction")?;

        Ok(categories)
    }

    async fn save_categories(&self, categories: &HashMap<AppId, Categories>) -> Result<()> {
        if categories.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("begin transaction")?;

        for (&app_id, game_categories) in categories {
            sqlx::query("INSERT INTO game_categories (appid, categories) VALUES ($1, $2)")
                .bind(i64::from(app_id))
                .bind(codec::encode(game_categories))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("insert categories (appid={})", app_id))?;
        }

        tx.commit().await.context("commit transaction")?;

        tracing::debug!("saved categories for {} games", categories.len());
        Ok(())
    }
}
