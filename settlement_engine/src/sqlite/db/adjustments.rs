use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewPayoutAdjustment, OrderId, PayoutAdjustment},
    traits::AdjustmentQueryFilter,
};

/// Inserts a pending adjustment, storing the amount as a deduction.
///
/// A second adjustment for the same `(order_id, original_invoice_id)` fails with a unique constraint violation. In
/// SQLite this only aborts the statement, so the caller can re-read the existing row in the same transaction.
pub(crate) async fn insert_adjustment(
    adjustment: NewPayoutAdjustment,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PayoutAdjustment, sqlx::Error> {
    let adjustment: PayoutAdjustment = sqlx::query_as(
        r#"
        INSERT INTO payout_adjustments (
            organization_id,
            order_id,
            original_invoice_id,
            adjustment_type,
            amount,
            reason,
            created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(adjustment.organization_id)
    .bind(adjustment.order_id)
    .bind(adjustment.original_invoice_id)
    .bind(adjustment.adjustment_type.to_string())
    .bind(adjustment.amount.as_deduction())
    .bind(adjustment.reason)
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    debug!(
        "🧾️ Adjustment #{} of {} recorded for order {} (invoice {})",
        adjustment.id, adjustment.amount, adjustment.order_id, adjustment.original_invoice_id
    );
    Ok(adjustment)
}

pub async fn fetch_adjustment(id: i64, conn: &mut SqliteConnection) -> Result<Option<PayoutAdjustment>, sqlx::Error> {
    let adjustment = sqlx::query_as("SELECT * FROM payout_adjustments WHERE id = $1")
        .bind(id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(adjustment)
}

pub async fn fetch_adjustment_for_order_invoice(
    order_id: &OrderId,
    original_invoice_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutAdjustment>, sqlx::Error> {
    let adjustment =
        sqlx::query_as("SELECT * FROM payout_adjustments WHERE order_id = $1 AND original_invoice_id = $2")
            .bind(order_id.as_str())
            .bind(original_invoice_id)
            .fetch_all(conn)
            .await?
            .into_iter()
            .next();
    Ok(adjustment)
}

pub async fn search_adjustments(
    query: AdjustmentQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<PayoutAdjustment>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM payout_adjustments WHERE 1 = 1");
    if let Some(org) = query.organization_id {
        builder.push(" AND organization_id = ");
        builder.push_bind(org);
    }
    if let Some(order_id) = query.order_id {
        builder.push(" AND order_id = ");
        builder.push_bind(order_id.to_string());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status.to_string());
    }
    if let Some(invoice_id) = query.adjustment_invoice_id {
        builder.push(" AND adjustment_invoice_id = ");
        builder.push_bind(invoice_id);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🧾️ Executing query: {}", builder.sql());
    let adjustments = builder.build_query_as::<PayoutAdjustment>().fetch_all(conn).await?;
    Ok(adjustments)
}

/// Pending → Applied for one adjustment of the organization. Returns `None`, and writes nothing, if the adjustment is
/// not pending or belongs to someone else.
pub(crate) async fn mark_applied(
    id: i64,
    organization_id: &str,
    adjustment_invoice_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutAdjustment>, sqlx::Error> {
    let adjustment = sqlx::query_as(
        r#"
        UPDATE payout_adjustments SET status = 'Applied', adjustment_invoice_id = $1, applied_at = $2
        WHERE id = $3 AND organization_id = $4 AND status = 'Pending'
        RETURNING *
        "#,
    )
    .bind(adjustment_invoice_id)
    .bind(now)
    .bind(id)
    .bind(organization_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(adjustment)
}
