//! PostgreSQL store
//!
//! Each trait method is one statement or one short transaction, so the
//! guarantees match a remote data service: single-record operations are
//! atomic, multi-record workflows are not.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    InventoryItem, ItemStatus, SaleAnnotation, Seller, Settlement, SettlementStatus,
    SoldItemRecord, Suitcase, SuitcaseItem, SuitcaseStatus,
};

use super::{
    InventoryLedger, NewSettlement, NewSoldItemRecord, NewSuitcaseItem, ResizeOutcome,
    RestoreOutcome, RestoredItem, SettlementFilter, SettlementLedger, SettlementUpdate, Store,
    SuitcaseStore,
};
use crate::error::{AppError, AppResult};

const SUITCASE_COLUMNS: &str = "id, code, seller_id, status, city, neighborhood, \
     next_settlement_date, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, suitcase_id, inventory_id, quantity, status, created_at, updated_at";

const SETTLEMENT_COLUMNS: &str = "id, suitcase_id, seller_id, settlement_date, \
     next_settlement_date, total_sales, commission_amount, status, receipt_url, \
     receipt_digest, created_at, updated_at";

const SOLD_ITEM_COLUMNS: &str = "id, settlement_id, suitcase_item_id, inventory_id, price, \
     quantity, customer_name, payment_method, voided_at, created_at";

/// sqlx-backed implementation of [`Store`]
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    /// Create a new PgStore instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn parse_column<T: std::str::FromStr<Err = String>>(value: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|e: String| AppError::Internal(format!("corrupt column value: {}", e)))
}

#[derive(Debug, FromRow)]
struct SuitcaseRow {
    id: Uuid,
    code: String,
    seller_id: Uuid,
    status: String,
    city: Option<String>,
    neighborhood: Option<String>,
    next_settlement_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SuitcaseRow> for Suitcase {
    type Error = AppError;

    fn try_from(r: SuitcaseRow) -> AppResult<Self> {
        Ok(Suitcase {
            id: r.id,
            code: r.code,
            seller_id: r.seller_id,
            status: parse_column::<SuitcaseStatus>(&r.status)?,
            city: r.city,
            neighborhood: r.neighborhood,
            next_settlement_date: r.next_settlement_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    suitcase_id: Uuid,
    inventory_id: Uuid,
    quantity: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for SuitcaseItem {
    type Error = AppError;

    fn try_from(r: ItemRow) -> AppResult<Self> {
        Ok(SuitcaseItem {
            id: r.id,
            suitcase_id: r.suitcase_id,
            inventory_id: r.inventory_id,
            quantity: r.quantity,
            status: parse_column::<ItemStatus>(&r.status)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SettlementRow {
    id: Uuid,
    suitcase_id: Uuid,
    seller_id: Uuid,
    settlement_date: NaiveDate,
    next_settlement_date: Option<NaiveDate>,
    total_sales: Decimal,
    commission_amount: Decimal,
    status: String,
    receipt_url: Option<String>,
    receipt_digest: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettlementRow> for Settlement {
    type Error = AppError;

    fn try_from(r: SettlementRow) -> AppResult<Self> {
        Ok(Settlement {
            id: r.id,
            suitcase_id: r.suitcase_id,
            seller_id: r.seller_id,
            settlement_date: r.settlement_date,
            next_settlement_date: r.next_settlement_date,
            total_sales: r.total_sales,
            commission_amount: r.commission_amount,
            status: parse_column::<SettlementStatus>(&r.status)?,
            receipt_url: r.receipt_url,
            receipt_digest: r.receipt_digest,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SoldItemRow {
    id: Uuid,
    settlement_id: Uuid,
    suitcase_item_id: Uuid,
    inventory_id: Uuid,
    price: Decimal,
    quantity: i32,
    customer_name: Option<String>,
    payment_method: Option<String>,
    voided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<SoldItemRow> for SoldItemRecord {
    fn from(r: SoldItemRow) -> Self {
        SoldItemRecord {
            id: r.id,
            settlement_id: r.settlement_id,
            suitcase_item_id: r.suitcase_item_id,
            inventory_id: r.inventory_id,
            price: r.price,
            quantity: r.quantity,
            customer_name: r.customer_name,
            payment_method: r.payment_method,
            voided_at: r.voided_at,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct InventoryRow {
    id: Uuid,
    code: String,
    name: String,
    quantity: i32,
    price: Decimal,
    unit_cost: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryItem {
    fn from(r: InventoryRow) -> Self {
        InventoryItem {
            id: r.id,
            code: r.code,
            name: r.name,
            quantity: r.quantity,
            price: r.price,
            unit_cost: r.unit_cost,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SellerRow {
    id: Uuid,
    name: String,
    commission_rate: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SellerRow> for Seller {
    fn from(r: SellerRow) -> Self {
        Seller {
            id: r.id,
            name: r.name,
            commission_rate: r.commission_rate,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AnnotationRow {
    suitcase_item_id: Uuid,
    customer_name: Option<String>,
    payment_method: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl From<AnnotationRow> for SaleAnnotation {
    fn from(r: AnnotationRow) -> Self {
        SaleAnnotation {
            suitcase_item_id: r.suitcase_item_id,
            customer_name: r.customer_name,
            payment_method: r.payment_method,
            recorded_at: r.recorded_at,
        }
    }
}

/// Translate the one-pending-settlement index violation into a conflict
fn map_pending_conflict(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict {
            resource: "settlement".to_string(),
            message: "Suitcase already has a pending settlement".to_string(),
            message_pt: "A maleta já possui um acerto pendente".to_string(),
        },
        _ => AppError::PersistenceFailure(err),
    }
}

/// Atomic stock adjustment that refuses to go below zero
async fn adjust_stock(conn: &mut PgConnection, inventory_id: Uuid, delta: i32) -> AppResult<i32> {
    let updated = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE inventory_items
        SET quantity = quantity + $2, updated_at = NOW()
        WHERE id = $1 AND quantity + $2 >= 0
        RETURNING quantity
        "#,
    )
    .bind(inventory_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(quantity) = updated {
        return Ok(quantity);
    }

    let current = sqlx::query_as::<_, (String, i32)>(
        "SELECT code, quantity FROM inventory_items WHERE id = $1",
    )
    .bind(inventory_id)
    .fetch_optional(&mut *conn)
    .await?;

    match current {
        Some((code, quantity)) => Err(AppError::InsufficientStock(format!(
            "inventory item {} has {} unit(s), {} requested",
            code, quantity, -delta
        ))),
        None => Err(AppError::NotFound("Inventory item".to_string())),
    }
}

#[async_trait]
impl SuitcaseStore for PgStore {
    async fn get_suitcase(&self, id: Uuid) -> AppResult<Option<Suitcase>> {
        sqlx::query_as::<_, SuitcaseRow>(&format!(
            "SELECT {} FROM suitcases WHERE id = $1",
            SUITCASE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(Suitcase::try_from)
        .transpose()
    }

    async fn get_seller(&self, id: Uuid) -> AppResult<Option<Seller>> {
        let row = sqlx::query_as::<_, SellerRow>(
            "SELECT id, name, commission_rate, created_at, updated_at FROM sellers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Seller::from))
    }

    async fn set_next_settlement_date(&self, suitcase_id: Uuid, date: NaiveDate) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE suitcases SET next_settlement_date = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(suitcase_id)
        .bind(date)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Suitcase".to_string()));
        }
        Ok(())
    }

    async fn list_suitcase_items(
        &self,
        suitcase_id: Uuid,
        status: Option<ItemStatus>,
    ) -> AppResult<Vec<SuitcaseItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {}
            FROM suitcase_items
            WHERE suitcase_id = $1 AND ($2::varchar IS NULL OR status = $2)
            ORDER BY created_at, id
            "#,
            ITEM_COLUMNS
        ))
        .bind(suitcase_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(SuitcaseItem::try_from).collect()
    }

    async fn get_suitcase_item(&self, id: Uuid) -> AppResult<Option<SuitcaseItem>> {
        sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM suitcase_items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(SuitcaseItem::try_from)
        .transpose()
    }

    async fn insert_suitcase_item(&self, item: NewSuitcaseItem) -> AppResult<SuitcaseItem> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO suitcase_items (suitcase_id, inventory_id, quantity, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(item.suitcase_id)
        .bind(item.inventory_id)
        .bind(item.quantity)
        .bind(ItemStatus::InPossession.as_str())
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    async fn compare_and_set_item_status(
        &self,
        id: Uuid,
        expected: ItemStatus,
        next: ItemStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE suitcase_items
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn resize_item(&self, id: Uuid, quantity: i32) -> AppResult<ResizeOutcome> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, (String, i32, Uuid)>(
            "SELECT status, quantity, inventory_id FROM suitcase_items WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Suitcase item".to_string()))?;

        let status = parse_column::<ItemStatus>(&current.0)?;
        if status != ItemStatus::InPossession {
            return Ok(ResizeOutcome::NotInPossession(status));
        }

        adjust_stock(&mut tx, current.2, current.1 - quantity).await?;

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "UPDATE suitcase_items SET quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ResizeOutcome::Resized(row.try_into()?))
    }

    async fn return_item_to_stock(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query_as::<_, (Uuid, i32)>(
            r#"
            UPDATE suitcase_items
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING inventory_id, quantity
            "#,
        )
        .bind(id)
        .bind(ItemStatus::Returned.as_str())
        .bind(ItemStatus::InPossession.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((inventory_id, quantity)) = claimed else {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM suitcase_items WHERE id = $1)",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            if !exists {
                return Err(AppError::NotFound("Suitcase item".to_string()));
            }
            return Ok(false);
        };

        adjust_stock(&mut tx, inventory_id, quantity).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn restore_suitcase_item(&self, item: RestoredItem) -> AppResult<RestoreOutcome> {
        let mut tx = self.db.begin().await?;

        let reattached = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO suitcase_items (id, suitcase_id, inventory_id, quantity, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(item.id)
        .bind(item.suitcase_id)
        .bind(item.inventory_id)
        .bind(item.quantity)
        .bind(ItemStatus::InPossession.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = if reattached.is_some() {
            RestoreOutcome::Reattached
        } else {
            let current = sqlx::query_scalar::<_, String>(
                "SELECT status FROM suitcase_items WHERE id = $1 FOR UPDATE",
            )
            .bind(item.id)
            .fetch_one(&mut *tx)
            .await?;

            let outcome = RestoreOutcome::for_status(parse_column::<ItemStatus>(&current)?);
            if outcome == RestoreOutcome::Restored {
                sqlx::query(
                    "UPDATE suitcase_items SET status = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(item.id)
                .bind(ItemStatus::InPossession.as_str())
                .execute(&mut *tx)
                .await?;
            }
            outcome
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn delete_suitcase_items(&self, suitcase_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM suitcase_items WHERE suitcase_id = $1")
            .bind(suitcase_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_suitcase_items(&self, suitcase_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM suitcase_items WHERE suitcase_id = $1",
        )
        .bind(suitcase_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    async fn sale_annotation(&self, suitcase_item_id: Uuid) -> AppResult<Option<SaleAnnotation>> {
        let row = sqlx::query_as::<_, AnnotationRow>(
            r#"
            SELECT suitcase_item_id, customer_name, payment_method, recorded_at
            FROM suitcase_item_sales
            WHERE suitcase_item_id = $1
            "#,
        )
        .bind(suitcase_item_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(SaleAnnotation::from))
    }

    async fn upsert_sale_annotation(&self, annotation: SaleAnnotation) -> AppResult<SaleAnnotation> {
        let row = sqlx::query_as::<_, AnnotationRow>(
            r#"
            INSERT INTO suitcase_item_sales (suitcase_item_id, customer_name, payment_method, recorded_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (suitcase_item_id) DO UPDATE
            SET customer_name = EXCLUDED.customer_name,
                payment_method = EXCLUDED.payment_method,
                recorded_at = EXCLUDED.recorded_at
            RETURNING suitcase_item_id, customer_name, payment_method, recorded_at
            "#,
        )
        .bind(annotation.suitcase_item_id)
        .bind(&annotation.customer_name)
        .bind(&annotation.payment_method)
        .bind(annotation.recorded_at)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl InventoryLedger for PgStore {
    async fn get_inventory_items(&self, ids: &[Uuid]) -> AppResult<Vec<InventoryItem>> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT id, code, name, quantity, price, unit_cost, created_at, updated_at
            FROM inventory_items
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(InventoryItem::from).collect())
    }

    async fn adjust_quantity(&self, inventory_id: Uuid, delta: i32) -> AppResult<i32> {
        let mut conn = self.db.acquire().await?;
        adjust_stock(&mut conn, inventory_id, delta).await
    }
}

#[async_trait]
impl SettlementLedger for PgStore {
    async fn find_pending_settlement(&self, suitcase_id: Uuid) -> AppResult<Option<Settlement>> {
        sqlx::query_as::<_, SettlementRow>(&format!(
            "SELECT {} FROM settlements WHERE suitcase_id = $1 AND status = $2 LIMIT 1",
            SETTLEMENT_COLUMNS
        ))
        .bind(suitcase_id)
        .bind(SettlementStatus::Pending.as_str())
        .fetch_optional(&self.db)
        .await?
        .map(Settlement::try_from)
        .transpose()
    }

    async fn insert_settlement(&self, new: NewSettlement) -> AppResult<Settlement> {
        let row = sqlx::query_as::<_, SettlementRow>(&format!(
            r#"
            INSERT INTO settlements (
                suitcase_id, seller_id, settlement_date, next_settlement_date,
                total_sales, commission_amount, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            SETTLEMENT_COLUMNS
        ))
        .bind(new.suitcase_id)
        .bind(new.seller_id)
        .bind(new.settlement_date)
        .bind(new.next_settlement_date)
        .bind(new.total_sales)
        .bind(new.commission_amount)
        .bind(new.status.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(map_pending_conflict)?;

        row.try_into()
    }

    async fn update_settlement(&self, id: Uuid, update: SettlementUpdate) -> AppResult<Settlement> {
        let row = sqlx::query_as::<_, SettlementRow>(&format!(
            r#"
            UPDATE settlements
            SET seller_id = $2, settlement_date = $3, next_settlement_date = $4,
                total_sales = $5, commission_amount = $6, status = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SETTLEMENT_COLUMNS
        ))
        .bind(id)
        .bind(update.seller_id)
        .bind(update.settlement_date)
        .bind(update.next_settlement_date)
        .bind(update.total_sales)
        .bind(update.commission_amount)
        .bind(update.status.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(map_pending_conflict)?
        .ok_or_else(|| AppError::NotFound("Settlement".to_string()))?;

        row.try_into()
    }

    async fn set_settlement_status(
        &self,
        id: Uuid,
        status: SettlementStatus,
    ) -> AppResult<Option<Settlement>> {
        sqlx::query_as::<_, SettlementRow>(&format!(
            "UPDATE settlements SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            SETTLEMENT_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(map_pending_conflict)?
        .map(Settlement::try_from)
        .transpose()
    }

    async fn set_receipt(&self, id: Uuid, url: &str, digest: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE settlements
            SET receipt_url = $2, receipt_digest = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(url)
        .bind(digest)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Settlement".to_string()));
        }
        Ok(())
    }

    async fn get_settlement(&self, id: Uuid) -> AppResult<Option<Settlement>> {
        sqlx::query_as::<_, SettlementRow>(&format!(
            "SELECT {} FROM settlements WHERE id = $1",
            SETTLEMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(Settlement::try_from)
        .transpose()
    }

    async fn list_settlements(&self, filter: &SettlementFilter) -> AppResult<Vec<Settlement>> {
        let rows = sqlx::query_as::<_, SettlementRow>(&format!(
            r#"
            SELECT {}
            FROM settlements
            WHERE ($1::uuid IS NULL OR suitcase_id = $1)
              AND ($2::uuid IS NULL OR seller_id = $2)
              AND ($3::varchar IS NULL OR status = $3)
              AND ($4::date IS NULL OR settlement_date >= $4)
              AND ($5::date IS NULL OR settlement_date <= $5)
            ORDER BY settlement_date DESC, created_at DESC
            LIMIT $6 OFFSET $7
            "#,
            SETTLEMENT_COLUMNS
        ))
        .bind(filter.suitcase_id)
        .bind(filter.seller_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(i64::from(filter.page.limit))
        .bind(i64::from(filter.page.offset))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Settlement::try_from).collect()
    }

    async fn delete_settlement(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM settlements WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_sold_item(&self, new: NewSoldItemRecord) -> AppResult<SoldItemRecord> {
        let row = sqlx::query_as::<_, SoldItemRow>(&format!(
            r#"
            INSERT INTO sold_item_records (
                settlement_id, suitcase_item_id, inventory_id, price, quantity,
                customer_name, payment_method
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            SOLD_ITEM_COLUMNS
        ))
        .bind(new.settlement_id)
        .bind(new.suitcase_item_id)
        .bind(new.inventory_id)
        .bind(new.price)
        .bind(new.quantity)
        .bind(&new.customer_name)
        .bind(&new.payment_method)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    async fn list_sold_items(&self, settlement_id: Uuid) -> AppResult<Vec<SoldItemRecord>> {
        let rows = sqlx::query_as::<_, SoldItemRow>(&format!(
            "SELECT {} FROM sold_item_records WHERE settlement_id = $1 ORDER BY created_at, id",
            SOLD_ITEM_COLUMNS
        ))
        .bind(settlement_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(SoldItemRecord::from).collect())
    }

    async fn delete_sold_item(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM sold_item_records WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn purge_sold_items(&self, settlement_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sold_item_records WHERE settlement_id = $1")
            .bind(settlement_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn void_sold_items(&self, settlement_id: Uuid, at: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sold_item_records
            SET voided_at = $2
            WHERE settlement_id = $1 AND voided_at IS NULL
            "#,
        )
        .bind(settlement_id)
        .bind(at)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
