use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrderBatch, Order, OrderBatch},
    traits::data_objects::{BatchCommand, BatchQueryFilter},
};

#[derive(Debug, Clone, Error)]
pub enum BatchError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order batch {0} does not exist")]
    BatchNotFound(i64),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<sqlx::Error> for BatchError {
    fn from(e: sqlx::Error) -> Self {
        BatchError::DatabaseError(e.to_string())
    }
}

/// Storage for order batches. Soft-deleted batches are invisible to every method here.
#[allow(async_fn_in_trait)]
pub trait BatchManagement: Clone {
    async fn insert_batch(&self, batch: NewOrderBatch, now: DateTime<Utc>) -> Result<OrderBatch, BatchError>;

    async fn fetch_batch(&self, batch_id: i64) -> Result<Option<OrderBatch>, BatchError>;

    /// Applies an edit and returns the updated batch. `SoftDelete` returns the batch as it is after deletion.
    async fn apply_batch_command(
        &self,
        batch_id: i64,
        command: BatchCommand,
        now: DateTime<Utc>,
    ) -> Result<OrderBatch, BatchError>;

    /// Batches ordered by `start_date`.
    async fn search_batches(&self, query: BatchQueryFilter) -> Result<Vec<OrderBatch>, BatchError>;

    /// The live orders of the batch's organization whose order date falls inside the batch range.
    async fn fetch_orders_in_batch(&self, batch_id: i64) -> Result<Vec<Order>, BatchError>;
}
