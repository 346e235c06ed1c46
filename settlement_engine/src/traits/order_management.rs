use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{CheckoutId, NewOrder, Order, OrderId},
    traits::data_objects::{OrderQueryFilter, PaymentCommand},
};

#[derive(Debug, Clone, Error)]
pub enum OrderAttachmentError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Checkout session {0} does not exist")]
    SessionNotFound(CheckoutId),
    #[error("Order {order_id} is linked to checkout session {checkout_id} and cannot take a direct checkout")]
    AttachmentConflict { order_id: OrderId, checkout_id: CheckoutId },
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<sqlx::Error> for OrderAttachmentError {
    fn from(e: sqlx::Error) -> Self {
        OrderAttachmentError::DatabaseError(e.to_string())
    }
}

/// The settlement engine's mirror of orders, and the only path that writes an order's payment attachment.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Stores the order if it is not known yet. This call is idempotent.
    /// Returns true if the order was inserted, or false if it already existed.
    async fn insert_order(&self, order: NewOrder, now: DateTime<Utc>) -> Result<(Order, bool), OrderAttachmentError>;

    /// Fetches the order, including soft-deleted orders.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderAttachmentError>;

    /// Live orders linked to the given checkout session, in the order they were added to the session.
    async fn fetch_orders_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<Order>, OrderAttachmentError>;

    /// Writes the payment attachment described by the command in a single transaction, and returns the orders that
    /// were modified.
    async fn apply_payment_command(
        &self,
        command: PaymentCommand,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderAttachmentError>;

    async fn soft_delete_order(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<Order, OrderAttachmentError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderAttachmentError>;
}
