//! `SqliteDatabase` is the SQLite implementation of every backend trait in [`crate::traits`].
use std::{collections::HashSet, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{
    adjustments,
    batches,
    checkout_sessions,
    db_url,
    is_unique_violation,
    new_pool,
    orders,
    voucher_costs,
};
use crate::{
    db_types::{
        Amount,
        CheckoutId,
        CheckoutSession,
        NewCheckoutSession,
        NewOrder,
        NewOrderBatch,
        NewPayoutAdjustment,
        NewVoucherRedemptionCost,
        Order,
        OrderBatch,
        OrderId,
        OrderStatusType,
        PaymentAttachment,
        PayoutAdjustment,
        SessionStatus,
        VoucherRedemptionCost,
    },
    traits::{
        AdjustmentError,
        AdjustmentManagement,
        AdjustmentQueryFilter,
        AppliedAdjustments,
        BatchCommand,
        BatchError,
        BatchManagement,
        BatchQueryFilter,
        CheckoutError,
        CheckoutManagement,
        ExpiryResult,
        InsertAdjustmentResult,
        OrderAttachmentError,
        OrderManagement,
        OrderQueryFilter,
        PaymentCommand,
        RedemptionCostQueryFilter,
        SessionCommand,
        SessionUpdate,
        VoucherCostError,
        VoucherCostManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `SPE_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete for {}", self.url);
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn session_or_not_found(&self, checkout_id: &CheckoutId) -> Result<CheckoutSession, CheckoutError> {
        self.fetch_session_by_checkout_id(checkout_id)
            .await?
            .ok_or_else(|| CheckoutError::SessionNotFound(checkout_id.clone()))
    }
}

/// Checks that `order` may join a new session for `customer_id`. Any session it is currently linked to must be
/// unusable at `now`.
async fn check_order_can_join_session(
    order_id: &OrderId,
    order: Option<Order>,
    customer_id: &str,
    now: DateTime<Utc>,
    conn: &mut sqlx::SqliteConnection,
) -> Result<Order, CheckoutError> {
    let order = match order {
        Some(o) if !o.is_deleted => o,
        _ => return Err(CheckoutError::OrderNotFound(order_id.clone())),
    };
    if order.customer_id != customer_id {
        return Err(CheckoutError::InvariantViolation(format!(
            "Order {order_id} belongs to customer {}, not {customer_id}",
            order.customer_id
        )));
    }
    if order.status != OrderStatusType::New {
        return Err(CheckoutError::InvariantViolation(format!(
            "Order {order_id} is {} and cannot be paid for again",
            order.status
        )));
    }
    match &order.payment {
        PaymentAttachment::Unattached => {},
        PaymentAttachment::Direct(d) => {
            return Err(CheckoutError::InvariantViolation(format!(
                "Order {order_id} already has the direct checkout {}",
                d.checkout_id
            )));
        },
        PaymentAttachment::SessionLinked { checkout_id, .. } => {
            let previous = checkout_sessions::fetch_session_by_checkout_id(checkout_id, conn).await?;
            if previous.map(|s| s.is_usable(now)).unwrap_or(false) {
                return Err(CheckoutError::InvariantViolation(format!(
                    "Order {order_id} is already part of the open checkout session {checkout_id}"
                )));
            }
            debug!("🛒️ Order {order_id} is moving out of the closed checkout session {checkout_id}");
        },
    }
    Ok(order)
}

impl CheckoutManagement for SqliteDatabase {
    async fn insert_checkout_session(
        &self,
        session: NewCheckoutSession,
        now: DateTime<Utc>,
    ) -> Result<CheckoutSession, CheckoutError> {
        if session.order_ids.is_empty() {
            return Err(CheckoutError::InvariantViolation("A checkout session needs at least one order".into()));
        }
        let mut seen = HashSet::with_capacity(session.order_ids.len());
        if let Some(dup) = session.order_ids.iter().find(|id| !seen.insert(*id)) {
            return Err(CheckoutError::InvariantViolation(format!("Order {dup} appears twice in the session")));
        }
        let checkout_id = session.checkout_id.clone();
        let order_ids = session.order_ids.clone();
        let mut tx = self.pool.begin().await?;
        // The session row goes in first. The order checks below then run under the write lock.
        let mut stored = match checkout_sessions::insert_session(session, Amount::ZERO, now, &mut tx).await {
            Err(e) if is_unique_violation(&e) => return Err(CheckoutError::CheckoutAlreadyExists(checkout_id)),
            result => result?,
        };
        let mut totals = Vec::with_capacity(order_ids.len());
        for order_id in &order_ids {
            let order = orders::fetch_order_by_order_id(order_id, &mut tx).await?;
            let order = check_order_can_join_session(order_id, order, &stored.customer_id, now, &mut tx).await?;
            totals.push(order.total_amount);
        }
        let total = Amount::checked_sum(totals).ok_or_else(|| {
            CheckoutError::InvariantViolation(format!("The order totals of checkout session {checkout_id} overflow"))
        })?;
        checkout_sessions::set_total_amount(stored.id, total, &mut tx).await?;
        stored.total_amount = total;
        for order_id in &order_ids {
            orders::link_to_session(order_id, &checkout_id, now, &mut tx)
                .await?
                .ok_or_else(|| CheckoutError::OrderNotFound(order_id.clone()))?;
        }
        tx.commit().await?;
        info!("🛒️ Checkout session {checkout_id} created for {} orders, total {total}", order_ids.len());
        Ok(stored)
    }

    async fn fetch_session_by_checkout_id(
        &self,
        checkout_id: &CheckoutId,
    ) -> Result<Option<CheckoutSession>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        let session = checkout_sessions::fetch_session_by_checkout_id(checkout_id, &mut conn).await?;
        Ok(session)
    }

    async fn fetch_session_by_invoice_id(&self, invoice_id: &str) -> Result<Option<CheckoutSession>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        let session = checkout_sessions::fetch_session_by_invoice_id(invoice_id, &mut conn).await?;
        Ok(session)
    }

    async fn fetch_sessions_for_customer(&self, customer_id: &str) -> Result<Vec<CheckoutSession>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        let sessions = checkout_sessions::fetch_sessions_for_customer(customer_id, &mut conn).await?;
        Ok(sessions)
    }

    async fn record_invoice_attempt(
        &self,
        checkout_id: &CheckoutId,
        max_attempts: i64,
        now: DateTime<Utc>,
    ) -> Result<CheckoutSession, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        if let Some(session) =
            checkout_sessions::increment_invoice_attempts(checkout_id, max_attempts, now, &mut tx).await?
        {
            tx.commit().await?;
            return Ok(session);
        }
        let session = checkout_sessions::fetch_session_by_checkout_id(checkout_id, &mut tx)
            .await?
            .ok_or_else(|| CheckoutError::SessionNotFound(checkout_id.clone()))?;
        tx.rollback().await?;
        if session.status == SessionStatus::Pending {
            Err(CheckoutError::AttemptsExhausted {
                checkout_id: checkout_id.clone(),
                attempts: session.invoice_creation_attempts,
            })
        } else {
            Err(CheckoutError::SessionClosed { checkout_id: checkout_id.clone(), status: session.status })
        }
    }

    async fn apply_session_command(
        &self,
        checkout_id: &CheckoutId,
        command: SessionCommand,
        now: DateTime<Utc>,
    ) -> Result<SessionUpdate, CheckoutError> {
        trace!("🛒️ Applying {command} to checkout session {checkout_id}");
        let mut tx = self.pool.begin().await?;
        // The session write always comes first, so that the transaction takes the write lock before reading anything.
        let updated = match &command {
            SessionCommand::RefreshInvoice(invoice) => {
                let session = checkout_sessions::set_invoice(checkout_id, invoice, now, &mut tx).await?;
                if session.is_some() {
                    let patched = orders::set_session_invoice(checkout_id, invoice, now, &mut tx).await?;
                    debug!("🛒️ Invoice {} propagated to {} orders", invoice.invoice_id, patched.len());
                }
                session
            },
            SessionCommand::MarkPaid { paid_at } => {
                let session = checkout_sessions::update_status(
                    checkout_id,
                    SessionStatus::Pending,
                    SessionStatus::Paid,
                    Some(*paid_at),
                    now,
                    &mut tx,
                )
                .await?;
                if let Some(session) = &session {
                    let expected = session.order_ids.len() as u64;
                    let marked = orders::mark_session_orders_paid(checkout_id, *paid_at, now, &mut tx).await?;
                    if marked != expected {
                        warn!(
                            "🛒️ Only {marked} of {expected} orders in checkout session {checkout_id} could be marked \
                             as paid. Rolling back."
                        );
                        return Err(CheckoutError::UnresolvedSettlement {
                            checkout_id: checkout_id.clone(),
                            reason: format!("{marked} of {expected} orders could be marked as paid"),
                        });
                    }
                }
                session
            },
            SessionCommand::Expire => {
                checkout_sessions::update_status(
                    checkout_id,
                    SessionStatus::Pending,
                    SessionStatus::Expired,
                    None,
                    now,
                    &mut tx,
                )
                .await?
            },
            SessionCommand::Cancel => {
                checkout_sessions::update_status(
                    checkout_id,
                    SessionStatus::Pending,
                    SessionStatus::Cancelled,
                    None,
                    now,
                    &mut tx,
                )
                .await?
            },
        };
        match updated {
            Some(session) => {
                tx.commit().await?;
                Ok(SessionUpdate::applied(session))
            },
            None => {
                tx.rollback().await?;
                let session = self.session_or_not_found(checkout_id).await?;
                trace!("🛒️ {command} was a no-op. Checkout session {checkout_id} is {}", session.status);
                Ok(SessionUpdate::unchanged(session))
            },
        }
    }

    async fn expire_overdue_sessions(&self, now: DateTime<Utc>) -> Result<ExpiryResult, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let expired = checkout_sessions::expire_overdue(now, &mut tx).await?;
        tx.commit().await?;
        Ok(ExpiryResult { expired })
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder, now: DateTime<Utc>) -> Result<(Order, bool), OrderAttachmentError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, now, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderAttachmentError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<Order>, OrderAttachmentError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_checkout(checkout_id, &mut conn).await?;
        Ok(orders)
    }

    async fn apply_payment_command(
        &self,
        command: PaymentCommand,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderAttachmentError> {
        let mut tx = self.pool.begin().await?;
        let result = match command {
            PaymentCommand::AttachDirectCheckout { order_id, checkout } => {
                match orders::set_direct_checkout(&order_id, &checkout, now, &mut tx).await? {
                    Some(order) => vec![order],
                    None => {
                        let existing = orders::fetch_order_by_order_id(&order_id, &mut tx).await?;
                        return match existing.filter(|o| !o.is_deleted) {
                            None => Err(OrderAttachmentError::OrderNotFound(order_id)),
                            Some(order) => match order.session_checkout_id() {
                                Some(checkout_id) => Err(OrderAttachmentError::AttachmentConflict {
                                    order_id,
                                    checkout_id: checkout_id.clone(),
                                }),
                                None => Err(OrderAttachmentError::InvariantViolation(format!(
                                    "Could not attach a direct checkout to order {order_id}"
                                ))),
                            },
                        };
                    },
                }
            },
            PaymentCommand::PropagateSessionInvoice { checkout_id, invoice } => {
                // The session keeps the same invoice as its orders, so it is written first.
                if checkout_sessions::set_invoice(&checkout_id, &invoice, now, &mut tx).await?.is_none() {
                    let session = checkout_sessions::fetch_session_by_checkout_id(&checkout_id, &mut tx).await?;
                    return match session {
                        None => Err(OrderAttachmentError::SessionNotFound(checkout_id)),
                        Some(s) => Err(OrderAttachmentError::InvariantViolation(format!(
                            "Checkout session {checkout_id} is {} and cannot take a new invoice",
                            s.status
                        ))),
                    };
                }
                orders::set_session_invoice(&checkout_id, &invoice, now, &mut tx).await?
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn soft_delete_order(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<Order, OrderAttachmentError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::soft_delete(order_id, now, &mut tx)
            .await?
            .ok_or_else(|| OrderAttachmentError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderAttachmentError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }
}

impl BatchManagement for SqliteDatabase {
    async fn insert_batch(&self, batch: NewOrderBatch, now: DateTime<Utc>) -> Result<OrderBatch, BatchError> {
        let mut tx = self.pool.begin().await?;
        let batch = batches::insert_batch(batch, now, &mut tx).await?;
        tx.commit().await?;
        Ok(batch)
    }

    async fn fetch_batch(&self, batch_id: i64) -> Result<Option<OrderBatch>, BatchError> {
        let mut conn = self.pool.acquire().await?;
        let batch = batches::fetch_batch(batch_id, &mut conn).await?;
        Ok(batch)
    }

    async fn apply_batch_command(
        &self,
        batch_id: i64,
        command: BatchCommand,
        now: DateTime<Utc>,
    ) -> Result<OrderBatch, BatchError> {
        let mut tx = self.pool.begin().await?;
        let batch = match command {
            BatchCommand::Rename { name, description } => {
                batches::rename(batch_id, &name, description.as_deref(), now, &mut tx).await?
            },
            BatchCommand::Reschedule(range) => batches::reschedule(batch_id, range, now, &mut tx).await?,
            BatchCommand::SetActive(active) => batches::set_active(batch_id, active, now, &mut tx).await?,
            BatchCommand::ToggleActive => batches::toggle_active(batch_id, now, &mut tx).await?,
            BatchCommand::SoftDelete => batches::soft_delete(batch_id, now, &mut tx).await?,
        };
        let batch = batch.ok_or(BatchError::BatchNotFound(batch_id))?;
        tx.commit().await?;
        Ok(batch)
    }

    async fn search_batches(&self, query: BatchQueryFilter) -> Result<Vec<OrderBatch>, BatchError> {
        let mut conn = self.pool.acquire().await?;
        let batches = batches::search_batches(query, &mut conn).await?;
        Ok(batches)
    }

    async fn fetch_orders_in_batch(&self, batch_id: i64) -> Result<Vec<Order>, BatchError> {
        let mut conn = self.pool.acquire().await?;
        let batch = batches::fetch_batch(batch_id, &mut conn).await?.ok_or(BatchError::BatchNotFound(batch_id))?;
        let orders = batches::fetch_orders_in_batch(&batch, &mut conn).await?;
        Ok(orders)
    }
}

impl AdjustmentManagement for SqliteDatabase {
    async fn insert_adjustment(
        &self,
        adjustment: NewPayoutAdjustment,
        now: DateTime<Utc>,
    ) -> Result<InsertAdjustmentResult, AdjustmentError> {
        let order_id = adjustment.order_id.clone();
        let organization_id = adjustment.organization_id.clone();
        let original_invoice_id = adjustment.original_invoice_id.clone();
        let mut tx = self.pool.begin().await?;
        // Insert first so that the transaction holds the write lock. A row for an invalid order is rolled back below.
        let result = match adjustments::insert_adjustment(adjustment, now, &mut tx).await {
            Ok(adj) => InsertAdjustmentResult::Inserted(adj),
            Err(e) if is_unique_violation(&e) => {
                let existing =
                    adjustments::fetch_adjustment_for_order_invoice(&order_id, &original_invoice_id, &mut tx)
                        .await?
                        .ok_or_else(|| {
                            AdjustmentError::DatabaseError(format!(
                                "Adjustment for order {order_id} and invoice {original_invoice_id} vanished"
                            ))
                        })?;
                debug!("🧾️ Adjustment for order {order_id} and invoice {original_invoice_id} already exists");
                InsertAdjustmentResult::AlreadyExists(existing)
            },
            Err(e) => return Err(e.into()),
        };
        let order = orders::fetch_order_by_order_id(&order_id, &mut tx)
            .await?
            .ok_or_else(|| AdjustmentError::OrderNotFound(order_id.clone()))?;
        if order.organization_id != organization_id {
            return Err(AdjustmentError::InvariantViolation(format!(
                "Order {order_id} belongs to organization {}, not {organization_id}",
                order.organization_id
            )));
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_adjustment(&self, id: i64) -> Result<Option<PayoutAdjustment>, AdjustmentError> {
        let mut conn = self.pool.acquire().await?;
        let adjustment = adjustments::fetch_adjustment(id, &mut conn).await?;
        Ok(adjustment)
    }

    async fn fetch_adjustment_for_order_invoice(
        &self,
        order_id: &OrderId,
        original_invoice_id: &str,
    ) -> Result<Option<PayoutAdjustment>, AdjustmentError> {
        let mut conn = self.pool.acquire().await?;
        let adjustment =
            adjustments::fetch_adjustment_for_order_invoice(order_id, original_invoice_id, &mut conn).await?;
        Ok(adjustment)
    }

    async fn search_adjustments(&self, query: AdjustmentQueryFilter) -> Result<Vec<PayoutAdjustment>, AdjustmentError> {
        let mut conn = self.pool.acquire().await?;
        let adjustments = adjustments::search_adjustments(query, &mut conn).await?;
        Ok(adjustments)
    }

    async fn apply_adjustments(
        &self,
        organization_id: &str,
        adjustment_invoice_id: &str,
        ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<AppliedAdjustments, AdjustmentError> {
        let mut tx = self.pool.begin().await?;
        let mut seen = HashSet::with_capacity(ids.len());
        let mut applied = Vec::with_capacity(ids.len());
        for &id in ids.iter().filter(|id| seen.insert(**id)) {
            let marked = adjustments::mark_applied(id, organization_id, adjustment_invoice_id, now, &mut tx).await?;
            if let Some(adj) = marked {
                applied.push(adj);
                continue;
            }
            let existing = adjustments::fetch_adjustment(id, &mut tx)
                .await?
                .filter(|a| a.organization_id == organization_id)
                .ok_or(AdjustmentError::AdjustmentNotFound(id))?;
            match existing.adjustment_invoice_id.as_deref() {
                Some(invoice) if invoice == adjustment_invoice_id => {
                    trace!("🧾️ Adjustment #{id} was already applied to {adjustment_invoice_id}");
                    applied.push(existing);
                },
                other => {
                    return Err(AdjustmentError::InvariantViolation(format!(
                        "Adjustment #{id} was already applied to invoice {}",
                        other.unwrap_or("<none>")
                    )));
                },
            }
        }
        tx.commit().await?;
        Ok(AppliedAdjustments { adjustment_invoice_id: adjustment_invoice_id.to_string(), adjustments: applied })
    }
}

impl VoucherCostManagement for SqliteDatabase {
    async fn insert_redemption_cost(
        &self,
        cost: NewVoucherRedemptionCost,
        now: DateTime<Utc>,
    ) -> Result<VoucherRedemptionCost, VoucherCostError> {
        let mut tx = self.pool.begin().await?;
        let cost = voucher_costs::insert_redemption_cost(cost, now, &mut tx).await?;
        tx.commit().await?;
        Ok(cost)
    }

    async fn fetch_redemption_cost(&self, id: i64) -> Result<Option<VoucherRedemptionCost>, VoucherCostError> {
        let mut conn = self.pool.acquire().await?;
        voucher_costs::fetch_redemption_cost(id, &mut conn).await
    }

    async fn search_redemption_costs(
        &self,
        query: RedemptionCostQueryFilter,
    ) -> Result<Vec<VoucherRedemptionCost>, VoucherCostError> {
        let mut conn = self.pool.acquire().await?;
        voucher_costs::search_redemption_costs(query, &mut conn).await
    }

    async fn soft_delete_redemption_cost(&self, id: i64) -> Result<VoucherRedemptionCost, VoucherCostError> {
        let mut tx = self.pool.begin().await?;
        let cost = voucher_costs::soft_delete(id, &mut tx).await?.ok_or(VoucherCostError::RedemptionCostNotFound(id))?;
        tx.commit().await?;
        Ok(cost)
    }

    async fn replace_redemption_cost(
        &self,
        id: i64,
        replacement: NewVoucherRedemptionCost,
        now: DateTime<Utc>,
    ) -> Result<VoucherRedemptionCost, VoucherCostError> {
        let mut tx = self.pool.begin().await?;
        let old = voucher_costs::soft_delete(id, &mut tx).await?.ok_or(VoucherCostError::RedemptionCostNotFound(id))?;
        let new = voucher_costs::insert_redemption_cost(replacement, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🎟️ Redemption cost #{} replaced by #{} for voucher {}", old.id, new.id, new.voucher_id);
        Ok(new)
    }
}
