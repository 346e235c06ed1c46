use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{DateRange, NewOrderBatch, Order, OrderBatch},
    settlement_api::Clock,
    traits::{BatchCommand, BatchError, BatchManagement, BatchQueryFilter},
};

/// `BatchApi` manages the date-ranged order batches that payouts are computed over.
pub struct BatchApi<B> {
    db: B,
    clock: Clock,
}

impl<B> Debug for BatchApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BatchApi")
    }
}

impl<B> BatchApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, clock: Clock::default() }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

fn validate_name(name: &str) -> Result<(), BatchError> {
    if name.trim().is_empty() {
        return Err(BatchError::InvariantViolation("A batch needs a name".into()));
    }
    Ok(())
}

fn validate_range(range: &DateRange) -> Result<(), BatchError> {
    if !range.is_valid() {
        return Err(BatchError::InvariantViolation(format!("The batch range {range} is empty")));
    }
    Ok(())
}

impl<B> BatchApi<B>
where B: BatchManagement
{
    pub async fn create_batch(&self, batch: NewOrderBatch) -> Result<OrderBatch, BatchError> {
        validate_name(&batch.name)?;
        validate_range(&DateRange::new(batch.start_date, batch.end_date))?;
        let batch = self.db.insert_batch(batch, self.clock.now()).await?;
        info!("📦️ Batch '{}' created for {} covering {}", batch.name, batch.organization_id, batch.range());
        Ok(batch)
    }

    pub async fn fetch_batch(&self, batch_id: i64) -> Result<OrderBatch, BatchError> {
        self.db.fetch_batch(batch_id).await?.ok_or(BatchError::BatchNotFound(batch_id))
    }

    /// Applies an edit to a live batch. Deleted batches cannot be edited.
    pub async fn edit_batch(&self, batch_id: i64, command: BatchCommand) -> Result<OrderBatch, BatchError> {
        match &command {
            BatchCommand::Rename { name, .. } => validate_name(name)?,
            BatchCommand::Reschedule(range) => validate_range(range)?,
            _ => {},
        }
        trace!("📦️ Applying {command} to batch #{batch_id}");
        self.db.apply_batch_command(batch_id, command, self.clock.now()).await
    }

    pub async fn toggle_active(&self, batch_id: i64) -> Result<OrderBatch, BatchError> {
        self.edit_batch(batch_id, BatchCommand::ToggleActive).await
    }

    pub async fn set_active(&self, batch_id: i64, active: bool) -> Result<OrderBatch, BatchError> {
        self.edit_batch(batch_id, BatchCommand::SetActive(active)).await
    }

    pub async fn soft_delete(&self, batch_id: i64) -> Result<OrderBatch, BatchError> {
        let batch = self.edit_batch(batch_id, BatchCommand::SoftDelete).await?;
        info!("📦️ Batch #{batch_id} deleted");
        Ok(batch)
    }

    /// The organization's live batches whose range overlaps `range`.
    pub async fn list_batches_overlapping(
        &self,
        organization_id: &str,
        range: DateRange,
    ) -> Result<Vec<OrderBatch>, BatchError> {
        self.search_batches(BatchQueryFilter::for_organization(organization_id).overlapping(range)).await
    }

    pub async fn search_batches(&self, query: BatchQueryFilter) -> Result<Vec<OrderBatch>, BatchError> {
        if let Some(range) = &query.overlapping {
            validate_range(range)?;
        }
        self.db.search_batches(query).await
    }

    /// The orders that fall in the batch: live orders of the batch's organization with
    /// `start_date <= order_date < end_date`.
    pub async fn orders_in_batch(&self, batch_id: i64) -> Result<Vec<Order>, BatchError> {
        self.db.fetch_orders_in_batch(batch_id).await
    }
}
