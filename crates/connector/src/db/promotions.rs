//! Promotion repository.
//!
//! `promotion_sku` holds the SKU set a promotion should apply to. Upserts
//! diff the stored set against the incoming one and write the attach/detach
//! queue items for the difference in the same transaction. The product
//! associations themselves (`sku_promotion`) are changed later by the queue
//! workers. `promotion_store` records which stores list a promotion, so a
//! pull of one store only disables what that store stopped listing.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use commerce_connector_core::{NormalizedPromotion, PromotionId, StoreUuid};

use super::RepositoryError;
use super::queue::insert_item;
use crate::managers::{
    ManagerError, PromotionChange, PromotionsManager, applicable_skus, diff_skus,
};

#[derive(FromRow)]
struct UpsertedRow {
    id: i32,
    created: bool,
}

#[derive(FromRow)]
struct StaleRow {
    id: i32,
    rule_id: String,
}

async fn link_store(
    tx: &mut Transaction<'_, Postgres>,
    promotion_id: i32,
    store: &StoreUuid,
) -> Result<(), RepositoryError> {
    if store.is_unspecified() {
        return Ok(());
    }
    sqlx::query(
        r"
        INSERT INTO connector.promotion_store (promotion_id, acm_uuid)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(promotion_id)
    .bind(store.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Write the queue items of a change; returns how many were written.
async fn write_queue_work(
    tx: &mut Transaction<'_, Postgres>,
    store: &StoreUuid,
    change: &PromotionChange,
) -> Result<usize, RepositoryError> {
    let work = change.queue_work(store);
    for (queue, payload) in &work {
        insert_item(&mut **tx, *queue, payload).await?;
    }
    Ok(work.len())
}

/// Postgres-backed [`PromotionsManager`].
#[derive(Debug, Clone)]
pub struct PgPromotionsManager {
    pool: PgPool,
}

impl PgPromotionsManager {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn stored_skus(
    tx: &mut Transaction<'_, Postgres>,
    promotion_id: i32,
) -> Result<Vec<String>, RepositoryError> {
    let skus = sqlx::query_scalar(
        "SELECT sku FROM connector.promotion_sku WHERE promotion_id = $1 ORDER BY sku",
    )
    .bind(promotion_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(skus)
}

async fn apply_diff(
    tx: &mut Transaction<'_, Postgres>,
    promotion_id: i32,
    attached: &[String],
    detached: &[String],
) -> Result<(), RepositoryError> {
    if !detached.is_empty() {
        sqlx::query("DELETE FROM connector.promotion_sku WHERE promotion_id = $1 AND sku = ANY($2)")
            .bind(promotion_id)
            .bind(detached)
            .execute(&mut **tx)
            .await?;
    }
    if !attached.is_empty() {
        sqlx::query(
            r"
            INSERT INTO connector.promotion_sku (promotion_id, sku)
            SELECT $1, UNNEST($2::TEXT[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(promotion_id)
        .bind(attached)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl PromotionsManager for PgPromotionsManager {
    #[instrument(skip(self, promotion), fields(store = %store, rule_id = %promotion.rule_id))]
    async fn upsert(
        &self,
        store: &StoreUuid,
        promotion: &NormalizedPromotion,
    ) -> Result<PromotionChange, ManagerError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        // xmax is zero only for rows this statement inserted.
        let row: UpsertedRow = sqlx::query_as(
            r"
            INSERT INTO connector.promotion
                (rule_id, code, name, description, promotion_type, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (rule_id) DO UPDATE
            SET code = EXCLUDED.code,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                promotion_type = EXCLUDED.promotion_type,
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING id, (xmax = 0) AS created
            ",
        )
        .bind(&promotion.rule_id)
        .bind(&promotion.code)
        .bind(&promotion.name)
        .bind(promotion.description.as_deref())
        .bind(promotion.promotion_type)
        .bind(promotion.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        link_store(&mut tx, row.id, store).await?;

        let current = stored_skus(&mut tx, row.id).await?;
        let (attached, detached) = diff_skus(&current, applicable_skus(promotion));
        apply_diff(&mut tx, row.id, &attached, &detached).await?;

        let mut change = PromotionChange {
            promotion_id: PromotionId::new(row.id),
            rule_id: promotion.rule_id.clone(),
            created: row.created,
            attached,
            detached,
            enqueued: 0,
        };
        change.enqueued = write_queue_work(&mut tx, store, &change).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        debug!(
            created = change.created,
            attached = change.attached.len(),
            detached = change.detached.len(),
            enqueued = change.enqueued,
            "Promotion stored"
        );
        Ok(change)
    }

    #[instrument(skip(self, keep), fields(store = %store, keep = keep.len()))]
    async fn disable_missing(
        &self,
        store: &StoreUuid,
        keep: &[String],
    ) -> Result<Vec<PromotionChange>, ManagerError> {
        if store.is_unspecified() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let stale: Vec<StaleRow> = sqlx::query_as(
            r"
            SELECT p.id, p.rule_id
            FROM connector.promotion p
            JOIN connector.promotion_store ps ON ps.promotion_id = p.id
            WHERE ps.acm_uuid = $1 AND p.status AND NOT (p.rule_id = ANY($2))
            ORDER BY p.rule_id
            FOR UPDATE OF p
            ",
        )
        .bind(store.as_str())
        .bind(keep)
        .fetch_all(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let mut changes = Vec::with_capacity(stale.len());
        for row in stale {
            sqlx::query(
                "DELETE FROM connector.promotion_store WHERE promotion_id = $1 AND acm_uuid = $2",
            )
            .bind(row.id)
            .bind(store.as_str())
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            let listed_elsewhere: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM connector.promotion_store WHERE promotion_id = $1)",
            )
            .bind(row.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            if listed_elsewhere {
                debug!(rule_id = %row.rule_id, "Promotion still listed by another store");
                continue;
            }

            sqlx::query(
                "UPDATE connector.promotion SET status = FALSE, updated_at = NOW() WHERE id = $1",
            )
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            let detached = stored_skus(&mut tx, row.id).await?;
            apply_diff(&mut tx, row.id, &[], &detached).await?;

            let mut change = PromotionChange {
                promotion_id: PromotionId::new(row.id),
                rule_id: row.rule_id,
                created: false,
                attached: Vec::new(),
                detached,
                enqueued: 0,
            };
            change.enqueued = write_queue_work(&mut tx, store, &change).await?;
            changes.push(change);
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(changes)
    }

    async fn desired_skus(&self, rule_id: &str) -> Result<Option<Vec<String>>, ManagerError> {
        let skus: Option<Vec<String>> = sqlx::query_scalar(
            r"
            SELECT ARRAY(
                SELECT ps.sku FROM connector.promotion_sku ps
                WHERE ps.promotion_id = p.id
                ORDER BY ps.sku
            )
            FROM connector.promotion p
            WHERE p.rule_id = $1
            ",
        )
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(skus)
    }
}
