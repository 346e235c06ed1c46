use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{DateRange, NewOrderBatch, Order, OrderBatch},
    traits::BatchQueryFilter,
};

pub(crate) async fn insert_batch(
    batch: NewOrderBatch,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderBatch, sqlx::Error> {
    let batch: OrderBatch = sqlx::query_as(
        r#"
        INSERT INTO order_batches (
            organization_id,
            name,
            description,
            start_date,
            end_date,
            is_active,
            created_by_id,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        RETURNING *
        "#,
    )
    .bind(batch.organization_id)
    .bind(batch.name)
    .bind(batch.description)
    .bind(batch.start_date)
    .bind(batch.end_date)
    .bind(batch.is_active)
    .bind(batch.created_by_id)
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    debug!("📦️ Batch '{}' #{} created for {}", batch.name, batch.id, batch.organization_id);
    Ok(batch)
}

/// Fetches a batch that has not been deleted.
pub async fn fetch_batch(id: i64, conn: &mut SqliteConnection) -> Result<Option<OrderBatch>, sqlx::Error> {
    let batch = sqlx::query_as("SELECT * FROM order_batches WHERE id = $1 AND is_deleted = FALSE")
        .bind(id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(batch)
}

pub(crate) async fn rename(
    id: i64,
    name: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderBatch>, sqlx::Error> {
    let batch = sqlx::query_as(
        r#"UPDATE order_batches SET name = $1, description = $2, updated_at = $3
        WHERE id = $4 AND is_deleted = FALSE RETURNING *"#,
    )
    .bind(name)
    .bind(description)
    .bind(now)
    .bind(id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(batch)
}

pub(crate) async fn reschedule(
    id: i64,
    range: DateRange,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderBatch>, sqlx::Error> {
    let batch = sqlx::query_as(
        r#"UPDATE order_batches SET start_date = $1, end_date = $2, updated_at = $3
        WHERE id = $4 AND is_deleted = FALSE RETURNING *"#,
    )
    .bind(range.start)
    .bind(range.end)
    .bind(now)
    .bind(id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(batch)
}

pub(crate) async fn set_active(
    id: i64,
    active: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderBatch>, sqlx::Error> {
    let batch = sqlx::query_as(
        "UPDATE order_batches SET is_active = $1, updated_at = $2 WHERE id = $3 AND is_deleted = FALSE RETURNING *",
    )
    .bind(active)
    .bind(now)
    .bind(id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(batch)
}

/// Flips `is_active` in a single statement, so concurrent toggles cannot read the same starting value.
pub(crate) async fn toggle_active(
    id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderBatch>, sqlx::Error> {
    let batch = sqlx::query_as(
        r#"UPDATE order_batches SET is_active = NOT is_active, updated_at = $1
        WHERE id = $2 AND is_deleted = FALSE RETURNING *"#,
    )
    .bind(now)
    .bind(id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(batch)
}

pub(crate) async fn soft_delete(
    id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderBatch>, sqlx::Error> {
    let batch = sqlx::query_as(
        r#"UPDATE order_batches SET is_deleted = TRUE, is_active = FALSE, updated_at = $1
        WHERE id = $2 AND is_deleted = FALSE RETURNING *"#,
    )
    .bind(now)
    .bind(id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(batch)
}

/// Live batches matching the filter, ordered by start date.
pub async fn search_batches(
    query: BatchQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderBatch>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM order_batches WHERE is_deleted = FALSE");
    if let Some(org) = query.organization_id {
        builder.push(" AND organization_id = ");
        builder.push_bind(org);
    }
    if let Some(range) = query.overlapping {
        // Half-open ranges overlap iff each starts before the other ends
        builder.push(" AND start_date < ");
        builder.push_bind(range.end);
        builder.push(" AND end_date > ");
        builder.push_bind(range.start);
    }
    if query.active_only {
        builder.push(" AND is_active = TRUE");
    }
    builder.push(" ORDER BY start_date ASC, id ASC");
    trace!("📦️ Executing query: {}", builder.sql());
    let batches = builder.build_query_as::<OrderBatch>().fetch_all(conn).await?;
    Ok(batches)
}

/// The live orders of the batch's organization with `start_date <= order_date < end_date`.
pub async fn fetch_orders_in_batch(batch: &OrderBatch, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE organization_id = $1 AND is_deleted = FALSE AND order_date >= $2 AND order_date < $3
        ORDER BY order_date ASC
        "#,
    )
    .bind(batch.organization_id.as_str())
    .bind(batch.start_date)
    .bind(batch.end_date)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
