use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewVoucherRedemptionCost, VoucherRedemptionCost},
    traits::data_objects::RedemptionCostQueryFilter,
};

#[derive(Debug, Clone, Error)]
pub enum VoucherCostError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Voucher redemption cost {0} does not exist")]
    RedemptionCostNotFound(i64),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Could not serialize snapshot: {0}")]
    SnapshotError(String),
}

impl From<sqlx::Error> for VoucherCostError {
    fn from(e: sqlx::Error) -> Self {
        VoucherCostError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for VoucherCostError {
    fn from(e: serde_json::Error) -> Self {
        VoucherCostError::SnapshotError(e.to_string())
    }
}

/// An append-only log of platform-covered voucher redemption costs. Records are never updated in place.
#[allow(async_fn_in_trait)]
pub trait VoucherCostManagement: Clone {
    async fn insert_redemption_cost(
        &self,
        cost: NewVoucherRedemptionCost,
        now: DateTime<Utc>,
    ) -> Result<VoucherRedemptionCost, VoucherCostError>;

    async fn fetch_redemption_cost(&self, id: i64) -> Result<Option<VoucherRedemptionCost>, VoucherCostError>;

    /// Records ordered by creation date, oldest first.
    async fn search_redemption_costs(
        &self,
        query: RedemptionCostQueryFilter,
    ) -> Result<Vec<VoucherRedemptionCost>, VoucherCostError>;

    async fn soft_delete_redemption_cost(&self, id: i64) -> Result<VoucherRedemptionCost, VoucherCostError>;

    /// Soft-deletes the record `id` and inserts `replacement` in a single transaction. The record must not already be
    /// deleted.
    async fn replace_redemption_cost(
        &self,
        id: i64,
        replacement: NewVoucherRedemptionCost,
        now: DateTime<Utc>,
    ) -> Result<VoucherRedemptionCost, VoucherCostError>;
}
