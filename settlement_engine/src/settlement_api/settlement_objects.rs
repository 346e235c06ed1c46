use std::{fmt::Display, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Amount, CheckoutId, CheckoutSession, PayoutAdjustment, VoucherRedemptionCost};

/// The source of "now" for an API. Tests swap in a fixed or stepping clock.
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>);

impl Clock {
    pub fn new<F: Fn() -> DateTime<Utc> + Send + Sync + 'static>(f: F) -> Self {
        Self(Arc::new(f))
    }

    /// A clock that always reads `ts`.
    pub fn fixed(ts: DateTime<Utc>) -> Self {
        Self::new(move || ts)
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.0)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Utc::now)
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Clock({})", self.now().to_rfc3339())
    }
}

/// How a payment notification identifies what was paid. Providers report either the session's checkout id or their
/// own invoice id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentReference {
    CheckoutId(CheckoutId),
    InvoiceId(String),
}

impl Display for PaymentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentReference::CheckoutId(id) => write!(f, "checkout {id}"),
            PaymentReference::InvoiceId(id) => write!(f, "invoice {id}"),
        }
    }
}

/// A payment confirmation, as delivered by a gateway webhook or a status poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub reference: PaymentReference,
    /// The amount the provider says was paid, if it reports one.
    pub amount_paid: Option<Amount>,
    pub paid_at: DateTime<Utc>,
}

impl PaymentConfirmation {
    pub fn for_checkout(checkout_id: CheckoutId, paid_at: DateTime<Utc>) -> Self {
        Self { reference: PaymentReference::CheckoutId(checkout_id), amount_paid: None, paid_at }
    }

    pub fn for_invoice<S: Into<String>>(invoice_id: S, paid_at: DateTime<Utc>) -> Self {
        Self { reference: PaymentReference::InvoiceId(invoice_id.into()), amount_paid: None, paid_at }
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount_paid = Some(amount);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResult {
    /// True if the session was already paid. Nothing was written.
    pub already_applied: bool,
    pub session: CheckoutSession,
}

/// Exponential backoff for invoice creation. Only transient gateway failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// The ceiling on the session's persisted attempt counter, not on attempts made by one call.
    pub max_attempts: i64,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: i64, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self { max_attempts, initial_backoff, max_backoff }
    }

    /// The delay after the given (zero-based) failed attempt.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_backoff.checked_mul(factor).unwrap_or(self.max_backoff).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(15))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRecorded {
    pub adjustment: PayoutAdjustment,
    /// True if this refund or cancellation had already been recorded. The stored adjustment is returned unchanged.
    pub already_recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionCostSummary {
    pub costs: Vec<VoucherRedemptionCost>,
    pub total_covered: Amount,
}

impl RedemptionCostSummary {
    pub fn new(costs: Vec<VoucherRedemptionCost>) -> Self {
        let total_covered = costs.iter().map(|c| c.amount_covered).sum();
        Self { costs, total_covered }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let p = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(2), Duration::from_millis(350));
        assert_eq!(p.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn fixed_clock() {
        let ts = Utc::now();
        let clock = Clock::fixed(ts);
        assert_eq!(clock.now(), ts);
        assert_eq!(clock.clone().now(), ts);
    }
}
