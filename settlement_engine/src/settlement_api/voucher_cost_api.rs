use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{DateRange, NewVoucherRedemptionCost, OrderId, VoucherRedemptionCost},
    settlement_api::{Clock, RedemptionCostSummary},
    traits::{RedemptionCostQueryFilter, VoucherCostError, VoucherCostManagement},
};

/// `VoucherCostApi` tracks the part of a refund-type voucher that the platform pays for, so that it is not deducted
/// from the seller's payout.
pub struct VoucherCostApi<B> {
    db: B,
    clock: Clock,
}

impl<B> Debug for VoucherCostApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VoucherCostApi")
    }
}

impl<B> VoucherCostApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, clock: Clock::default() }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

fn validate(cost: &NewVoucherRedemptionCost) -> Result<(), VoucherCostError> {
    if !cost.amount_covered.is_positive() {
        return Err(VoucherCostError::InvariantViolation(format!(
            "The covered amount for voucher {} must be positive, not {}",
            cost.voucher_id, cost.amount_covered
        )));
    }
    if cost.order_snapshot.order_id != cost.order_id {
        return Err(VoucherCostError::InvariantViolation(format!(
            "The order snapshot is for {}, not {}",
            cost.order_snapshot.order_id, cost.order_id
        )));
    }
    Ok(())
}

impl<B> VoucherCostApi<B>
where B: VoucherCostManagement
{
    pub async fn record_redemption_cost(
        &self,
        cost: NewVoucherRedemptionCost,
    ) -> Result<VoucherRedemptionCost, VoucherCostError> {
        validate(&cost)?;
        self.db.insert_redemption_cost(cost, self.clock.now()).await
    }

    pub async fn fetch_redemption_cost(&self, id: i64) -> Result<VoucherRedemptionCost, VoucherCostError> {
        self.db.fetch_redemption_cost(id).await?.ok_or(VoucherCostError::RedemptionCostNotFound(id))
    }

    /// The live costs covered for the seller's orders, recorded within `range`.
    pub async fn redemption_costs_for_seller(
        &self,
        seller_organization_id: &str,
        range: DateRange,
    ) -> Result<RedemptionCostSummary, VoucherCostError> {
        let query = RedemptionCostQueryFilter::default().with_seller(seller_organization_id).created_in(range);
        let costs = self.db.search_redemption_costs(query).await?;
        Ok(RedemptionCostSummary::new(costs))
    }

    pub async fn redemption_costs_for_voucher(
        &self,
        voucher_id: &str,
    ) -> Result<Vec<VoucherRedemptionCost>, VoucherCostError> {
        self.db.search_redemption_costs(RedemptionCostQueryFilter::default().with_voucher_id(voucher_id)).await
    }

    pub async fn redemption_costs_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<VoucherRedemptionCost>, VoucherCostError> {
        self.db.search_redemption_costs(RedemptionCostQueryFilter::default().with_order_id(order_id.clone())).await
    }

    pub async fn search_redemption_costs(
        &self,
        query: RedemptionCostQueryFilter,
    ) -> Result<Vec<VoucherRedemptionCost>, VoucherCostError> {
        self.db.search_redemption_costs(query).await
    }

    pub async fn soft_delete_redemption_cost(&self, id: i64) -> Result<VoucherRedemptionCost, VoucherCostError> {
        let cost = self.db.soft_delete_redemption_cost(id).await?;
        info!("🎟️ Redemption cost #{id} deleted");
        Ok(cost)
    }

    /// Replaces a record: the old one is soft-deleted and the replacement inserted, atomically.
    pub async fn correct_redemption_cost(
        &self,
        id: i64,
        replacement: NewVoucherRedemptionCost,
    ) -> Result<VoucherRedemptionCost, VoucherCostError> {
        validate(&replacement)?;
        self.db.replace_redemption_cost(id, replacement, self.clock.now()).await
    }
}
