//! Product repository: stock and promotion associations.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use commerce_connector_core::{PromotionId, SkuId, StockRecord, StoreUuid};

use super::RepositoryError;
use crate::managers::{ManagerError, Outcome, ProductManager};

/// Postgres-backed [`ProductManager`].
#[derive(Debug, Clone)]
pub struct PgProductManager {
    pool: PgPool,
}

impl PgProductManager {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Make sure a SKU exists locally, returning its id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn register_sku(&self, sku: &str) -> Result<SkuId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO connector.sku (sku)
            VALUES ($1)
            ON CONFLICT (sku) DO UPDATE SET updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(sku)
        .fetch_one(&self.pool)
        .await?;

        Ok(SkuId::new(id))
    }

    async fn promotion_id(&self, rule_id: &str) -> Result<Option<PromotionId>, RepositoryError> {
        let id: Option<i32> =
            sqlx::query_scalar("SELECT id FROM connector.promotion WHERE rule_id = $1")
                .bind(rule_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.map(PromotionId::new))
    }
}

#[async_trait]
impl ProductManager for PgProductManager {
    #[instrument(skip(self, record), fields(store = %store, sku = %record.sku))]
    async fn update_stock(
        &self,
        store: &StoreUuid,
        record: &StockRecord,
    ) -> Result<Outcome<()>, ManagerError> {
        let result = sqlx::query(
            r"
            INSERT INTO connector.sku_stock (sku_id, acm_uuid, quantity, is_in_stock)
            SELECT id, $2, $3, $4 FROM connector.sku WHERE sku = $1
            ON CONFLICT (sku_id, acm_uuid) DO UPDATE
            SET quantity = EXCLUDED.quantity,
                is_in_stock = EXCLUDED.is_in_stock,
                updated_at = NOW()
            ",
        )
        .bind(&record.sku)
        .bind(store.as_str())
        .bind(record.qty)
        .bind(record.is_in_stock)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Ok(Outcome::NotFound);
        }
        Ok(Outcome::Done(()))
    }

    #[instrument(skip(self, skus), fields(skus = skus.len()))]
    async fn attach_promotion(
        &self,
        rule_id: &str,
        skus: &[String],
    ) -> Result<Outcome<usize>, ManagerError> {
        let Some(promotion_id) = self.promotion_id(rule_id).await? else {
            return Ok(Outcome::NotFound);
        };

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        sqlx::query(
            r"
            INSERT INTO connector.sku_promotion (sku_id, promotion_id)
            SELECT id, $1 FROM connector.sku WHERE sku = ANY($2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(promotion_id.as_i32())
        .bind(skus)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let attached: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM connector.sku_promotion sp
            JOIN connector.sku s ON s.id = sp.sku_id
            WHERE sp.promotion_id = $1 AND s.sku = ANY($2)
            ",
        )
        .bind(promotion_id.as_i32())
        .bind(skus)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(Outcome::Done(usize::try_from(attached).unwrap_or_default()))
    }

    #[instrument(skip(self, skus), fields(skus = skus.len()))]
    async fn detach_promotion(
        &self,
        rule_id: &str,
        skus: &[String],
    ) -> Result<usize, ManagerError> {
        let result = sqlx::query(
            r"
            DELETE FROM connector.sku_promotion sp
            USING connector.sku s, connector.promotion p
            WHERE sp.sku_id = s.id
              AND sp.promotion_id = p.id
              AND p.rule_id = $1
              AND s.sku = ANY($2)
            ",
        )
        .bind(rule_id)
        .bind(skus)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(usize::try_from(result.rows_affected()).unwrap_or_default())
    }
}
