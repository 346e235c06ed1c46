use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewPayoutAdjustment, OrderId, PayoutAdjustment},
    traits::data_objects::{AdjustmentQueryFilter, AppliedAdjustments, InsertAdjustmentResult},
};

#[derive(Debug, Clone, Error)]
pub enum AdjustmentError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Payout adjustment {0} does not exist")]
    AdjustmentNotFound(i64),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<sqlx::Error> for AdjustmentError {
    fn from(e: sqlx::Error) -> Self {
        AdjustmentError::DatabaseError(e.to_string())
    }
}

/// The payout adjustment ledger.
///
/// There is at most one adjustment per `(order_id, original_invoice_id)` pair. This is enforced by a unique
/// constraint in the database, not by a prior read, so that duplicate refund events racing each other still produce
/// a single row.
#[allow(async_fn_in_trait)]
pub trait AdjustmentManagement: Clone {
    /// Inserts a `Pending` adjustment. The amount is stored as a deduction, whatever its sign.
    ///
    /// The order must exist, and belong to the adjustment's organization. If an adjustment for the same order and
    /// original invoice already exists, it is returned unchanged as [`InsertAdjustmentResult::AlreadyExists`].
    async fn insert_adjustment(
        &self,
        adjustment: NewPayoutAdjustment,
        now: DateTime<Utc>,
    ) -> Result<InsertAdjustmentResult, AdjustmentError>;

    async fn fetch_adjustment(&self, id: i64) -> Result<Option<PayoutAdjustment>, AdjustmentError>;

    async fn fetch_adjustment_for_order_invoice(
        &self,
        order_id: &OrderId,
        original_invoice_id: &str,
    ) -> Result<Option<PayoutAdjustment>, AdjustmentError>;

    /// Adjustments ordered by creation date, oldest first.
    async fn search_adjustments(&self, query: AdjustmentQueryFilter) -> Result<Vec<PayoutAdjustment>, AdjustmentError>;

    /// Marks the given adjustments as applied to `adjustment_invoice_id`, in a single atomic transaction.
    ///
    /// Adjustments that were already applied to the same invoice are included in the result but not written again.
    /// The call fails, and nothing is written, if any id is unknown, belongs to another organization, or was already
    /// applied to a different invoice.
    async fn apply_adjustments(
        &self,
        organization_id: &str,
        adjustment_invoice_id: &str,
        ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<AppliedAdjustments, AdjustmentError>;
}
