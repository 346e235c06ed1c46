use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Row, SqliteConnection};

use crate::{
    db_types::{
        CheckoutId,
        DirectCheckout,
        InvoiceDetails,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PaymentAttachment,
    },
    traits::OrderQueryFilter,
};

fn decode_error<E: std::error::Error + Send + Sync + 'static>(column: &str, e: E) -> sqlx::Error {
    sqlx::Error::ColumnDecode { index: column.to_string(), source: Box::new(e) }
}

fn missing_column(column: &str, kind: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("{column} must be set on orders with payment kind {kind}").into(),
    }
}

/// Orders carry both the direct checkout and the session column groups. Only the group selected by `payment_kind`
/// is read, so a row can never be turned into an order with two attachments.
impl<'r> FromRow<'r, SqliteRow> for Order {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<OrderStatusType>().map_err(|e| decode_error("status", e))?;
        let kind: String = row.try_get("payment_kind")?;
        let checkout_id: Option<String> = row.try_get("checkout_id")?;
        let payment = match kind.as_str() {
            "Unattached" => PaymentAttachment::Unattached,
            "Direct" => {
                let checkout_url: Option<String> = row.try_get("checkout_url")?;
                let expiry_date: Option<DateTime<Utc>> = row.try_get("checkout_expiry_date")?;
                let created_at: Option<DateTime<Utc>> = row.try_get("checkout_created_at")?;
                PaymentAttachment::Direct(DirectCheckout {
                    checkout_id: checkout_id.ok_or_else(|| missing_column("checkout_id", &kind))?,
                    checkout_url: checkout_url.ok_or_else(|| missing_column("checkout_url", &kind))?,
                    expiry_date: expiry_date.ok_or_else(|| missing_column("checkout_expiry_date", &kind))?,
                    created_at: created_at.ok_or_else(|| missing_column("checkout_created_at", &kind))?,
                })
            },
            "Session" => {
                let checkout_id = checkout_id.ok_or_else(|| missing_column("checkout_id", &kind))?;
                let invoice = InvoiceDetails::from_parts(
                    row.try_get("invoice_id")?,
                    row.try_get("invoice_url")?,
                    row.try_get("invoice_expiry_date")?,
                    row.try_get("invoice_created_at")?,
                );
                PaymentAttachment::SessionLinked { checkout_id: CheckoutId::from(checkout_id), invoice }
            },
            other => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "payment_kind".into(),
                    source: format!("Unknown payment kind: {other}").into(),
                })
            },
        };
        Ok(Order {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            customer_id: row.try_get("customer_id")?,
            organization_id: row.try_get("organization_id")?,
            total_amount: row.try_get("total_amount")?,
            order_date: row.try_get("order_date")?,
            status,
            is_deleted: row.try_get("is_deleted")?,
            paid_at: row.try_get("paid_at")?,
            payment,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
/// An existing order is returned as it is stored; the new values are ignored.
pub async fn idempotent_insert(
    order: NewOrder,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), sqlx::Error> {
    let order_id = order.order_id.clone();
    match insert_order(order, now, conn).await? {
        Some(order) => {
            debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
            Ok((order, true))
        },
        None => {
            let existing = fetch_order_by_order_id(&order_id, conn).await?.ok_or(sqlx::Error::RowNotFound)?;
            trace!("📝️ Order [{order_id}] already exists");
            Ok((existing, false))
        },
    }
}

/// Inserts the order, or does nothing and returns `None` if an order with the same `order_id` exists.
async fn insert_order(
    order: NewOrder,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_id,
                organization_id,
                total_amount,
                order_date,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.customer_id)
    .bind(order.organization_id)
    .bind(order.total_amount)
    .bind(order.order_date)
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(order)
}

/// The live orders linked to the session, in session position order.
pub async fn fetch_orders_for_checkout(
    checkout_id: &CheckoutId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        SELECT orders.* FROM orders
            JOIN checkout_sessions ON checkout_sessions.checkout_id = orders.checkout_id
            JOIN checkout_session_orders
                ON checkout_session_orders.session_id = checkout_sessions.id
                AND checkout_session_orders.order_id = orders.order_id
        WHERE orders.checkout_id = $1 AND orders.payment_kind = 'Session' AND orders.is_deleted = FALSE
        ORDER BY checkout_session_orders.position
        "#,
    )
    .bind(checkout_id.as_str())
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Links the order to a checkout session. Any previous attachment (including a stale invoice from an earlier session)
/// is cleared.
pub(crate) async fn link_to_session(
    order_id: &OrderId,
    checkout_id: &CheckoutId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            payment_kind = 'Session',
            checkout_id = $1,
            checkout_url = NULL,
            checkout_expiry_date = NULL,
            checkout_created_at = NULL,
            invoice_id = NULL,
            invoice_url = NULL,
            invoice_expiry_date = NULL,
            invoice_created_at = NULL,
            updated_at = $2
        WHERE order_id = $3 AND is_deleted = FALSE
        RETURNING *
        "#,
    )
    .bind(checkout_id.as_str())
    .bind(now)
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(order)
}

/// Sets the direct checkout attachment. The caller is responsible for checking that the order is not session-linked.
pub(crate) async fn set_direct_checkout(
    order_id: &OrderId,
    checkout: &DirectCheckout,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            payment_kind = 'Direct',
            checkout_id = $1,
            checkout_url = $2,
            checkout_expiry_date = $3,
            checkout_created_at = $4,
            invoice_id = NULL,
            invoice_url = NULL,
            invoice_expiry_date = NULL,
            invoice_created_at = NULL,
            updated_at = $4
        WHERE order_id = $5 AND is_deleted = FALSE AND payment_kind <> 'Session'
        RETURNING *
        "#,
    )
    .bind(checkout.checkout_id.as_str())
    .bind(checkout.checkout_url.as_str())
    .bind(checkout.expiry_date)
    .bind(now)
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(order)
}

/// Writes the invoice to every live order linked to the session and returns them.
pub(crate) async fn set_session_invoice(
    checkout_id: &CheckoutId,
    invoice: &InvoiceDetails,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            invoice_id = $1,
            invoice_url = $2,
            invoice_expiry_date = $3,
            invoice_created_at = $4,
            updated_at = $5
        WHERE checkout_id = $6 AND payment_kind = 'Session' AND is_deleted = FALSE
        RETURNING *
        "#,
    )
    .bind(invoice.invoice_id.as_str())
    .bind(invoice.invoice_url.as_str())
    .bind(invoice.expiry_date)
    .bind(invoice.created_at)
    .bind(now)
    .bind(checkout_id.as_str())
    .fetch_all(conn)
    .await?;
    trace!("📝️ Invoice {} written to {} orders of session {checkout_id}", invoice.invoice_id, orders.len());
    Ok(orders)
}

/// Marks every unpaid, live order of the session as paid. Returns the number of orders that were updated.
pub(crate) async fn mark_session_orders_paid(
    checkout_id: &CheckoutId,
    paid_at: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET status = 'Paid', paid_at = $1, updated_at = $2
        WHERE checkout_id = $3 AND payment_kind = 'Session' AND is_deleted = FALSE AND status = 'New'
        "#,
    )
    .bind(paid_at)
    .bind(now)
    .bind(checkout_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn soft_delete(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("UPDATE orders SET is_deleted = TRUE, updated_at = $1 WHERE order_id = $2 RETURNING *")
        .bind(now)
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(order)
}

/// Fetches orders according to the criteria in the `OrderQueryFilter`, ordered by `order_date` ascending.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders WHERE 1 = 1");
    if !query.include_deleted {
        builder.push(" AND is_deleted = FALSE");
    }
    if let Some(org) = query.organization_id {
        builder.push(" AND organization_id = ");
        builder.push_bind(org);
    }
    if let Some(cid) = query.customer_id {
        builder.push(" AND customer_id = ");
        builder.push_bind(cid);
    }
    if let Some(checkout_id) = query.checkout_id {
        builder.push(" AND payment_kind = 'Session' AND checkout_id = ");
        builder.push_bind(checkout_id.to_string());
    }
    if let Some(range) = query.order_date {
        builder.push(" AND order_date >= ");
        builder.push_bind(range.start);
        builder.push(" AND order_date < ");
        builder.push_bind(range.end);
    }
    builder.push(" ORDER BY order_date ASC");
    trace!("📝️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {}", orders.len());
    Ok(orders)
}
