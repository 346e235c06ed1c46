use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Amount, NewVoucherRedemptionCost, OrderId, VoucherRedemptionCost},
    traits::{RedemptionCostQueryFilter, VoucherCostError},
};

/// The stored row. Snapshots are JSON text.
#[derive(Debug, Clone, FromRow)]
struct RedemptionCostRow {
    id: i64,
    voucher_id: String,
    order_id: OrderId,
    seller_organization_id: String,
    amount_covered: Amount,
    voucher_snapshot: String,
    order_snapshot: String,
    seller_snapshot: String,
    is_deleted: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<RedemptionCostRow> for VoucherRedemptionCost {
    type Error = VoucherCostError;

    fn try_from(row: RedemptionCostRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            voucher_id: row.voucher_id,
            order_id: row.order_id,
            seller_organization_id: row.seller_organization_id,
            amount_covered: row.amount_covered,
            voucher_snapshot: serde_json::from_str(&row.voucher_snapshot)?,
            order_snapshot: serde_json::from_str(&row.order_snapshot)?,
            seller_snapshot: serde_json::from_str(&row.seller_snapshot)?,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
        })
    }
}

fn convert_all(rows: Vec<RedemptionCostRow>) -> Result<Vec<VoucherRedemptionCost>, VoucherCostError> {
    rows.into_iter().map(VoucherRedemptionCost::try_from).collect()
}

pub(crate) async fn insert_redemption_cost(
    cost: NewVoucherRedemptionCost,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<VoucherRedemptionCost, VoucherCostError> {
    let voucher_snapshot = serde_json::to_string(&cost.voucher_snapshot)?;
    let order_snapshot = serde_json::to_string(&cost.order_snapshot)?;
    let seller_snapshot = serde_json::to_string(&cost.seller_snapshot)?;
    let row: RedemptionCostRow = sqlx::query_as(
        r#"
        INSERT INTO voucher_redemption_costs (
            voucher_id,
            order_id,
            seller_organization_id,
            amount_covered,
            voucher_snapshot,
            order_snapshot,
            seller_snapshot,
            created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(cost.voucher_id)
    .bind(cost.order_id)
    .bind(cost.seller_organization_id)
    .bind(cost.amount_covered)
    .bind(voucher_snapshot)
    .bind(order_snapshot)
    .bind(seller_snapshot)
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    debug!("🎟️ Redemption cost #{} of {} recorded for voucher {}", row.id, row.amount_covered, row.voucher_id);
    row.try_into()
}

pub async fn fetch_redemption_cost(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<VoucherRedemptionCost>, VoucherCostError> {
    let row: Option<RedemptionCostRow> = sqlx::query_as("SELECT * FROM voucher_redemption_costs WHERE id = $1")
        .bind(id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    row.map(VoucherRedemptionCost::try_from).transpose()
}

pub async fn search_redemption_costs(
    query: RedemptionCostQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<VoucherRedemptionCost>, VoucherCostError> {
    let mut builder = QueryBuilder::new("SELECT * FROM voucher_redemption_costs WHERE 1 = 1");
    if !query.include_deleted {
        builder.push(" AND is_deleted = FALSE");
    }
    if let Some(voucher_id) = query.voucher_id {
        builder.push(" AND voucher_id = ");
        builder.push_bind(voucher_id);
    }
    if let Some(order_id) = query.order_id {
        builder.push(" AND order_id = ");
        builder.push_bind(order_id.to_string());
    }
    if let Some(seller) = query.seller_organization_id {
        builder.push(" AND seller_organization_id = ");
        builder.push_bind(seller);
    }
    if let Some(range) = query.created {
        builder.push(" AND created_at >= ");
        builder.push_bind(range.start);
        builder.push(" AND created_at < ");
        builder.push_bind(range.end);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🎟️ Executing query: {}", builder.sql());
    let rows = builder.build_query_as::<RedemptionCostRow>().fetch_all(conn).await?;
    convert_all(rows)
}

/// Marks a live record as deleted. Returns `None` if there is no live record with this id.
pub(crate) async fn soft_delete(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<VoucherRedemptionCost>, VoucherCostError> {
    let row: Option<RedemptionCostRow> = sqlx::query_as(
        "UPDATE voucher_redemption_costs SET is_deleted = TRUE WHERE id = $1 AND is_deleted = FALSE RETURNING *",
    )
    .bind(id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    row.map(VoucherRedemptionCost::try_from).transpose()
}
