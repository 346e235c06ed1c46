use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{CheckoutSession, Order, PayoutAdjustment};

/// A checkout session moved to `Paid`, together with the orders it paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPaidEvent {
    pub session: CheckoutSession,
    pub orders: Vec<Order>,
}

impl SessionPaidEvent {
    pub fn new(session: CheckoutSession, orders: Vec<Order>) -> Self {
        Self { session, orders }
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.session.paid_at
    }
}

/// A new payout adjustment was written to the ledger. Redelivered refund events do not produce this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRecordedEvent {
    pub adjustment: PayoutAdjustment,
}

impl AdjustmentRecordedEvent {
    pub fn new(adjustment: PayoutAdjustment) -> Self {
        Self { adjustment }
    }
}
