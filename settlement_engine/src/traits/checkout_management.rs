use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{CheckoutId, CheckoutSession, NewCheckoutSession, OrderId, SessionStatus},
    traits::{
        data_objects::{ExpiryResult, SessionCommand, SessionUpdate},
        OrderAttachmentError,
    },
};

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Checkout session {0} does not exist")]
    SessionNotFound(CheckoutId),
    #[error("No checkout session has the invoice {0}")]
    InvoiceNotFound(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("A checkout session with id {0} already exists")]
    CheckoutAlreadyExists(CheckoutId),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Checkout session {checkout_id} is {status} and can no longer be used")]
    SessionClosed { checkout_id: CheckoutId, status: SessionStatus },
    #[error("Payment for checkout session {checkout_id} could not be settled: {reason}")]
    UnresolvedSettlement { checkout_id: CheckoutId, reason: String },
    #[error("The payment gateway is temporarily unavailable: {0}")]
    GatewayTransient(String),
    #[error("The payment gateway rejected the invoice: {0}")]
    GatewayPermanent(String),
    #[error("The payment gateway outcome is unknown: {0}")]
    GatewayOutcomeUnknown(String),
    #[error("Invoice creation for checkout session {checkout_id} gave up after {attempts} attempts")]
    AttemptsExhausted { checkout_id: CheckoutId, attempts: i64 },
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        CheckoutError::DatabaseError(e.to_string())
    }
}

impl From<OrderAttachmentError> for CheckoutError {
    fn from(e: OrderAttachmentError) -> Self {
        match e {
            OrderAttachmentError::DatabaseError(s) => CheckoutError::DatabaseError(s),
            OrderAttachmentError::OrderNotFound(id) => CheckoutError::OrderNotFound(id),
            OrderAttachmentError::SessionNotFound(id) => CheckoutError::SessionNotFound(id),
            e => CheckoutError::InvariantViolation(e.to_string()),
        }
    }
}

impl CheckoutError {
    /// The message shown to the customer. Gateway and database detail never leaves the engine.
    pub fn customer_message(&self) -> &'static str {
        match self {
            CheckoutError::GatewayTransient(_) | CheckoutError::GatewayOutcomeUnknown(_) => "payment pending",
            CheckoutError::SessionClosed { status: SessionStatus::Expired, .. } => "payment expired",
            CheckoutError::UnresolvedSettlement { .. } => "payment pending",
            _ => "payment failed",
        }
    }
}

/// Storage of checkout sessions and the session state machine.
///
/// Every status transition is a compare-and-swap on the stored status, so concurrent callers (e.g. a webhook and
/// its redelivery) cannot both apply the same transition. Transitions that must also touch orders (invoice
/// propagation and marking orders as paid) happen in the same database transaction as the session write.
#[allow(async_fn_in_trait)]
pub trait CheckoutManagement: Clone {
    /// Validates the orders and stores a new `Pending` session, linking every order to it, in a single atomic
    /// transaction.
    ///
    /// The order list must be non-empty and free of duplicates. Every order must exist, not be deleted, belong to
    /// the session's customer, be in the `New` state, and have no direct checkout attached. An order may be moved
    /// from another session only if that session is no longer usable at `now`.
    async fn insert_checkout_session(
        &self,
        session: NewCheckoutSession,
        now: DateTime<Utc>,
    ) -> Result<CheckoutSession, CheckoutError>;

    /// Fetches the session as stored. Lazy expiry is *not* applied here.
    async fn fetch_session_by_checkout_id(
        &self,
        checkout_id: &CheckoutId,
    ) -> Result<Option<CheckoutSession>, CheckoutError>;

    async fn fetch_session_by_invoice_id(&self, invoice_id: &str) -> Result<Option<CheckoutSession>, CheckoutError>;

    /// All sessions for the customer, most recent first.
    async fn fetch_sessions_for_customer(&self, customer_id: &str) -> Result<Vec<CheckoutSession>, CheckoutError>;

    /// Increments the invoice attempt counter and stamps `last_invoice_attempt_at`. The session must be `Pending`.
    ///
    /// Until the session has an invoice, the counter never goes past `max_attempts`: the attempt that would do so
    /// fails with [`CheckoutError::AttemptsExhausted`] and writes nothing.
    ///
    /// This is committed before the gateway is called, so the counter survives crashes and concurrent callers.
    async fn record_invoice_attempt(
        &self,
        checkout_id: &CheckoutId,
        max_attempts: i64,
        now: DateTime<Utc>,
    ) -> Result<CheckoutSession, CheckoutError>;

    /// Applies the command to a `Pending` session. If the session is in any other state, nothing is written and
    /// [`SessionUpdate::applied`] is false.
    ///
    /// `MarkPaid` marks every order of the session as paid in the same transaction. If any of those orders cannot be
    /// marked, the transaction is rolled back and [`CheckoutError::UnresolvedSettlement`] is returned.
    async fn apply_session_command(
        &self,
        checkout_id: &CheckoutId,
        command: SessionCommand,
        now: DateTime<Utc>,
    ) -> Result<SessionUpdate, CheckoutError>;

    /// Moves every `Pending` session that is overdue at `now` to `Expired`.
    async fn expire_overdue_sessions(&self, now: DateTime<Utc>) -> Result<ExpiryResult, CheckoutError>;
}
