use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};

use crate::db_types::{
    Amount,
    CheckoutId,
    CheckoutSession,
    InvoiceDetails,
    NewCheckoutSession,
    OrderId,
    SessionStatus,
};

/// The flat `checkout_sessions` row. The order list lives in `checkout_session_orders`.
#[derive(Debug, Clone, FromRow)]
struct SessionRow {
    id: i64,
    checkout_id: CheckoutId,
    customer_id: String,
    total_amount: Amount,
    status: SessionStatus,
    invoice_id: Option<String>,
    invoice_url: Option<String>,
    invoice_expiry_date: Option<DateTime<Utc>>,
    invoice_created_at: Option<DateTime<Utc>>,
    invoice_created: bool,
    invoice_creation_attempts: i64,
    last_invoice_attempt_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self, order_ids: Vec<OrderId>) -> CheckoutSession {
        let invoice = InvoiceDetails::from_parts(
            self.invoice_id,
            self.invoice_url,
            self.invoice_expiry_date,
            self.invoice_created_at,
        );
        CheckoutSession {
            id: self.id,
            checkout_id: self.checkout_id,
            customer_id: self.customer_id,
            order_ids,
            total_amount: self.total_amount,
            status: self.status,
            invoice,
            invoice_created: self.invoice_created,
            invoice_creation_attempts: self.invoice_creation_attempts,
            last_invoice_attempt_at: self.last_invoice_attempt_at,
            expires_at: self.expires_at,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

async fn with_order_ids(row: SessionRow, conn: &mut SqliteConnection) -> Result<CheckoutSession, sqlx::Error> {
    let order_ids = fetch_order_ids(row.id, conn).await?;
    Ok(row.into_session(order_ids))
}

async fn with_order_ids_opt(
    row: Option<SessionRow>,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    match row {
        Some(row) => Ok(Some(with_order_ids(row, conn).await?)),
        None => Ok(None),
    }
}

async fn fetch_order_ids(session_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderId>, sqlx::Error> {
    let ids: Vec<(OrderId,)> =
        sqlx::query_as("SELECT order_id FROM checkout_session_orders WHERE session_id = $1 ORDER BY position")
            .bind(session_id)
            .fetch_all(conn)
            .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Inserts the session and its order links. This is not atomic on its own; call it inside a transaction.
pub(crate) async fn insert_session(
    session: NewCheckoutSession,
    total_amount: Amount,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<CheckoutSession, sqlx::Error> {
    let row: SessionRow = sqlx::query_as(
        r#"
        INSERT INTO checkout_sessions (checkout_id, customer_id, total_amount, expires_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING *
        "#,
    )
    .bind(session.checkout_id.as_str())
    .bind(session.customer_id.as_str())
    .bind(total_amount)
    .bind(session.expires_at)
    .bind(now)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    for (position, order_id) in session.order_ids.iter().enumerate() {
        sqlx::query("INSERT INTO checkout_session_orders (session_id, order_id, position) VALUES ($1, $2, $3)")
            .bind(row.id)
            .bind(order_id.as_str())
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }
    debug!("🛒️ Checkout session {} stored with id {} and {} orders", row.checkout_id, row.id, session.order_ids.len());
    Ok(row.into_session(session.order_ids))
}

pub async fn fetch_session_by_checkout_id(
    checkout_id: &CheckoutId,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM checkout_sessions WHERE checkout_id = $1")
        .bind(checkout_id.as_str())
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .next();
    with_order_ids_opt(row, conn).await
}

pub async fn fetch_session_by_invoice_id(
    invoice_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM checkout_sessions WHERE invoice_id = $1 ORDER BY id DESC LIMIT 1")
        .bind(invoice_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .next();
    with_order_ids_opt(row, conn).await
}

pub async fn fetch_sessions_for_customer(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<CheckoutSession>, sqlx::Error> {
    let rows: Vec<SessionRow> =
        sqlx::query_as("SELECT * FROM checkout_sessions WHERE customer_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(customer_id)
            .fetch_all(&mut *conn)
            .await?;
    let mut sessions = Vec::with_capacity(rows.len());
    for row in rows {
        sessions.push(with_order_ids(row, conn).await?);
    }
    Ok(sessions)
}

/// Atomically increments the attempt counter of a `Pending` session. A session without an invoice is only counted
/// while it has fewer than `max_attempts` attempts. Returns `None` if no session qualifies.
pub(crate) async fn increment_invoice_attempts(
    checkout_id: &CheckoutId,
    max_attempts: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    let row: Option<SessionRow> = sqlx::query_as(
        r#"
        UPDATE checkout_sessions SET
            invoice_creation_attempts = invoice_creation_attempts + 1,
            last_invoice_attempt_at = $1,
            updated_at = $1
        WHERE checkout_id = $2 AND status = 'Pending' AND (invoice_created OR invoice_creation_attempts < $3)
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(checkout_id.as_str())
    .bind(max_attempts)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next();
    if let Some(row) = &row {
        trace!("🛒️ Invoice attempt #{} recorded for session {checkout_id}", row.invoice_creation_attempts);
    }
    with_order_ids_opt(row, conn).await
}

/// Sets the total of a freshly inserted session.
pub(crate) async fn set_total_amount(
    session_id: i64,
    total_amount: Amount,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE checkout_sessions SET total_amount = $1 WHERE id = $2")
        .bind(total_amount)
        .bind(session_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Compare-and-swap on the session status. Returns `None`, and writes nothing, if the stored status is not `from`.
pub(crate) async fn update_status(
    checkout_id: &CheckoutId,
    from: SessionStatus,
    to: SessionStatus,
    paid_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    let row: Option<SessionRow> = sqlx::query_as(
        r#"
        UPDATE checkout_sessions SET status = $1, paid_at = COALESCE($2, paid_at), updated_at = $3
        WHERE checkout_id = $4 AND status = $5
        RETURNING *
        "#,
    )
    .bind(to.to_string())
    .bind(paid_at)
    .bind(now)
    .bind(checkout_id.as_str())
    .bind(from.to_string())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next();
    if row.is_some() {
        debug!("🛒️ Checkout session {checkout_id} moved from {from} to {to}");
    }
    with_order_ids_opt(row, conn).await
}

/// Stores the invoice on a `Pending` session. Returns `None` if there is no such session.
pub(crate) async fn set_invoice(
    checkout_id: &CheckoutId,
    invoice: &InvoiceDetails,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutSession>, sqlx::Error> {
    let row: Option<SessionRow> = sqlx::query_as(
        r#"
        UPDATE checkout_sessions SET
            invoice_id = $1,
            invoice_url = $2,
            invoice_expiry_date = $3,
            invoice_created_at = $4,
            invoice_created = TRUE,
            updated_at = $5
        WHERE checkout_id = $6 AND status = 'Pending'
        RETURNING *
        "#,
    )
    .bind(invoice.invoice_id.as_str())
    .bind(invoice.invoice_url.as_str())
    .bind(invoice.expiry_date)
    .bind(invoice.created_at)
    .bind(now)
    .bind(checkout_id.as_str())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next();
    with_order_ids_opt(row, conn).await
}

/// Moves every `Pending` session whose session or invoice expiry is at or before `now` to `Expired`, and returns
/// the expired sessions.
pub(crate) async fn expire_overdue(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CheckoutSession>, sqlx::Error> {
    let rows: Vec<SessionRow> = sqlx::query_as(
        r#"
        UPDATE checkout_sessions SET status = 'Expired', updated_at = $1
        WHERE status = 'Pending' AND (
            (expires_at IS NOT NULL AND expires_at <= $1) OR
            (invoice_expiry_date IS NOT NULL AND invoice_expiry_date <= $1)
        )
        RETURNING *
        "#,
    )
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;
    let mut sessions = Vec::with_capacity(rows.len());
    for row in rows {
        debug!("🛒️ Checkout session {} expired", row.checkout_id);
        sessions.push(with_order_ids(row, conn).await?);
    }
    sessions.sort_by_key(|s| s.id);
    Ok(sessions)
}
