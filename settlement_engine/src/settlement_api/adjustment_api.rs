use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{AdjustmentStatus, NewPayoutAdjustment, OrderId, PayoutAdjustment},
    events::{AdjustmentRecordedEvent, EventProducers},
    settlement_api::{AdjustmentRecorded, Clock},
    traits::{
        AdjustmentError,
        AdjustmentManagement,
        AdjustmentQueryFilter,
        AppliedAdjustments,
        InsertAdjustmentResult,
    },
};

/// `AdjustmentApi` reconciles refunds and cancellations of orders that were already included in a payout invoice.
///
/// Rather than changing the issued payout, each correction is recorded once as a pending deduction, and folded into
/// the organization's next payout invoice by [`AdjustmentApi::apply_adjustments`].
pub struct AdjustmentApi<B> {
    db: B,
    producers: EventProducers,
    clock: Clock,
}

impl<B> Debug for AdjustmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdjustmentApi")
    }
}

impl<B> AdjustmentApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, clock: Clock::default() }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

impl<B> AdjustmentApi<B>
where B: AdjustmentManagement
{
    /// Records a refund or cancellation of an already paid-out order.
    ///
    /// The amount is stored as a deduction (`-|amount|`). Recording the same order and original invoice again, e.g.
    /// because the refund event was delivered twice, returns the stored adjustment with `already_recorded: true`.
    pub async fn record_adjustment(
        &self,
        adjustment: NewPayoutAdjustment,
    ) -> Result<AdjustmentRecorded, AdjustmentError> {
        if adjustment.amount.is_zero() {
            return Err(AdjustmentError::InvariantViolation(format!(
                "The adjustment for order {} has a zero amount",
                adjustment.order_id
            )));
        }
        if adjustment.original_invoice_id.trim().is_empty() {
            return Err(AdjustmentError::InvariantViolation(format!(
                "The adjustment for order {} does not name the original payout invoice",
                adjustment.order_id
            )));
        }
        match self.db.insert_adjustment(adjustment, self.clock.now()).await? {
            InsertAdjustmentResult::Inserted(adjustment) => {
                info!(
                    "🧾️ {} of {} recorded against payout invoice {} for order {}",
                    adjustment.adjustment_type, adjustment.amount, adjustment.original_invoice_id, adjustment.order_id
                );
                self.producers.publish_adjustment_recorded(AdjustmentRecordedEvent::new(adjustment.clone())).await;
                Ok(AdjustmentRecorded { adjustment, already_recorded: false })
            },
            InsertAdjustmentResult::AlreadyExists(adjustment) => {
                debug!("🧾️ Adjustment #{} was already recorded. Ignoring the duplicate.", adjustment.id);
                Ok(AdjustmentRecorded { adjustment, already_recorded: true })
            },
        }
    }

    pub async fn fetch_adjustment(&self, id: i64) -> Result<PayoutAdjustment, AdjustmentError> {
        self.db.fetch_adjustment(id).await?.ok_or(AdjustmentError::AdjustmentNotFound(id))
    }

    pub async fn adjustment_for_order(
        &self,
        order_id: &OrderId,
        original_invoice_id: &str,
    ) -> Result<Option<PayoutAdjustment>, AdjustmentError> {
        self.db.fetch_adjustment_for_order_invoice(order_id, original_invoice_id).await
    }

    /// The organization's adjustments that have not been applied to a payout invoice yet, oldest first.
    pub async fn list_pending_adjustments(
        &self,
        organization_id: &str,
    ) -> Result<Vec<PayoutAdjustment>, AdjustmentError> {
        let query = AdjustmentQueryFilter::default()
            .with_organization_id(organization_id)
            .with_status(AdjustmentStatus::Pending);
        self.db.search_adjustments(query).await
    }

    pub async fn search_adjustments(
        &self,
        query: AdjustmentQueryFilter,
    ) -> Result<Vec<PayoutAdjustment>, AdjustmentError> {
        self.db.search_adjustments(query).await
    }

    /// Folds the given pending adjustments into the payout invoice `adjustment_invoice_id`.
    ///
    /// All or nothing: if any adjustment is unknown, belongs to another organization, or was applied to a different
    /// invoice, nothing is applied. Adjustments already applied to this invoice are accepted, so the call can be
    /// repeated safely.
    pub async fn apply_adjustments(
        &self,
        organization_id: &str,
        adjustment_invoice_id: &str,
        ids: &[i64],
    ) -> Result<AppliedAdjustments, AdjustmentError> {
        if adjustment_invoice_id.trim().is_empty() {
            return Err(AdjustmentError::InvariantViolation("The payout invoice id is empty".into()));
        }
        let applied = self.db.apply_adjustments(organization_id, adjustment_invoice_id, ids, self.clock.now()).await?;
        info!(
            "🧾️ {} adjustments totalling {} applied to payout invoice {adjustment_invoice_id}",
            applied.count(),
            applied.total()
        );
        Ok(applied)
    }
}
