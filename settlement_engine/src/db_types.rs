//! Data types shared between the settlement engine API and its database backends.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
pub use settlement_common::Amount;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    pub kind: &'static str,
    pub value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Declares a string-backed identifier newtype that is stored transparently in the database.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new<S: Into<String>>(s: S) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.trim().is_empty() {
                    return Err(ConversionError::new(stringify!($name), s));
                }
                Ok(Self(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// Declares `Display` and `FromStr` for a fieldless enum using the variant names as the canonical strings.
/// These strings are also what the SQLite backend stores.
macro_rules! status_strings {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str(stringify!($variant)),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(Self::$variant),)+
                    s => Err(ConversionError::new(stringify!($name), s)),
                }
            }
        }
    };
}

//--------------------------------------      Identifiers      -------------------------------------------------------
string_id!(
    /// The order identifier as assigned by the order lifecycle service.
    OrderId
);
string_id!(
    /// The caller-supplied, externally visible correlation key of a checkout session.
    CheckoutId
);

//--------------------------------------       DateRange       -------------------------------------------------------
/// A half-open timestamp range, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start <= *ts && *ts < self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

//--------------------------------------     InvoiceDetails    -------------------------------------------------------
/// A gateway invoice (hosted payment page) as recorded against a checkout session and its orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub invoice_id: String,
    pub invoice_url: String,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl InvoiceDetails {
    /// Assembles invoice details from nullable columns. All four must be present, since they are only ever written
    /// together.
    pub fn from_parts(
        invoice_id: Option<String>,
        invoice_url: Option<String>,
        expiry_date: Option<DateTime<Utc>>,
        created_at: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        match (invoice_id, invoice_url, expiry_date, created_at) {
            (Some(invoice_id), Some(invoice_url), Some(expiry_date), Some(created_at)) => {
                Some(Self { invoice_id, invoice_url, expiry_date, created_at })
            },
            _ => None,
        }
    }
}

//--------------------------------------     SessionStatus     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Awaiting payment. The only non-terminal state.
    Pending,
    /// A payment confirmation was received and every order in the session was marked as paid.
    Paid,
    /// The session or its invoice expired before any payment confirmation arrived.
    Expired,
    /// Cancelled by the customer or an operator.
    Cancelled,
}

status_strings!(SessionStatus { Pending, Paid, Expired, Cancelled });

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Pending)
    }
}

//--------------------------------------    CheckoutSession    -------------------------------------------------------
/// A single payment intent grouping one or more orders of the same customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: i64,
    pub checkout_id: CheckoutId,
    pub customer_id: String,
    pub order_ids: Vec<OrderId>,
    /// The sum of the order totals at creation time. Never re-derived.
    pub total_amount: Amount,
    /// The *stored* status. Use [`CheckoutSession::effective_status`] to account for lazy expiry.
    pub status: SessionStatus,
    pub invoice: Option<InvoiceDetails>,
    pub invoice_created: bool,
    pub invoice_creation_attempts: i64,
    pub last_invoice_attempt_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// True if the session-level or invoice-level expiry has passed at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        let session_expired = self.expires_at.map(|t| t <= now).unwrap_or(false);
        let invoice_expired = self.invoice.as_ref().map(|i| i.expiry_date <= now).unwrap_or(false);
        session_expired || invoice_expired
    }

    /// The status of the session as observed at `now`. A pending session whose expiry has passed is reported as
    /// `Expired`, whether or not that transition has been persisted yet.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SessionStatus {
        match self.status {
            SessionStatus::Pending if self.is_overdue(now) => SessionStatus::Expired,
            s => s,
        }
    }

    /// Whether invoices may still be created for, and payments expected against, this session.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == SessionStatus::Pending
    }

    pub fn invoice_id(&self) -> Option<&str> {
        self.invoice.as_ref().map(|i| i.invoice_id.as_str())
    }

    /// The idempotency key to hand to the gateway for the next invoice attempt.
    ///
    /// Until an invoice exists, every retry reuses the checkout id, so an attempt with an unknown outcome cannot
    /// produce a second invoice. Once an invoice exists, a refresh is deliberate, and the key includes the attempt
    /// number.
    pub fn invoice_idempotency_key(&self) -> String {
        if self.invoice_created {
            format!("{}:refresh:{}", self.checkout_id, self.invoice_creation_attempts)
        } else {
            self.checkout_id.to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCheckoutSession {
    pub checkout_id: CheckoutId,
    pub customer_id: String,
    pub order_ids: Vec<OrderId>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewCheckoutSession {
    pub fn new<S: Into<String>>(checkout_id: CheckoutId, customer_id: S, order_ids: Vec<OrderId>) -> Self {
        Self { checkout_id, customer_id: customer_id.into(), order_ids, expires_at: None }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

//--------------------------------------    OrderStatusType    -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order is newly created, and no payment has been confirmed.
    New,
    /// The payment for the order has been confirmed.
    Paid,
    /// The order has been cancelled by the order lifecycle service.
    Cancelled,
    /// The order has expired in the order lifecycle service.
    Expired,
}

status_strings!(OrderStatusType { New, Paid, Cancelled, Expired });

//--------------------------------------   PaymentAttachment   -------------------------------------------------------
/// A checkout link created for a single order, outside any checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectCheckout {
    pub checkout_id: String,
    pub checkout_url: String,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// The active payment mechanism of an order. An order carries at most one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PaymentAttachment {
    #[default]
    Unattached,
    Direct(DirectCheckout),
    SessionLinked { checkout_id: CheckoutId, invoice: Option<InvoiceDetails> },
}

impl PaymentAttachment {
    /// The value of the `payment_kind` discriminator column.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentAttachment::Unattached => "Unattached",
            PaymentAttachment::Direct(_) => "Direct",
            PaymentAttachment::SessionLinked { .. } => "Session",
        }
    }
}

//--------------------------------------         Order         -------------------------------------------------------
/// The settlement engine's view of an order. The order itself belongs to the order lifecycle service; only the
/// payment fields are written here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub organization_id: String,
    pub total_amount: Amount,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatusType,
    pub is_deleted: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment: PaymentAttachment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn session_checkout_id(&self) -> Option<&CheckoutId> {
        match &self.payment {
            PaymentAttachment::SessionLinked { checkout_id, .. } => Some(checkout_id),
            _ => None,
        }
    }

    pub fn session_invoice(&self) -> Option<&InvoiceDetails> {
        match &self.payment {
            PaymentAttachment::SessionLinked { invoice, .. } => invoice.as_ref(),
            _ => None,
        }
    }

    pub fn direct_checkout(&self) -> Option<&DirectCheckout> {
        match &self.payment {
            PaymentAttachment::Direct(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_id: String,
    pub organization_id: String,
    pub total_amount: Amount,
    /// The date used for batch membership.
    pub order_date: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<C: Into<String>, O: Into<String>>(
        order_id: OrderId,
        customer_id: C,
        organization_id: O,
        total_amount: Amount,
        order_date: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            customer_id: customer_id.into(),
            organization_id: organization_id.into(),
            total_amount,
            order_date,
        }
    }
}

//--------------------------------------       OrderBatch      -------------------------------------------------------
/// A named, organization-scoped, date-ranged grouping of orders used as the unit of payout computation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderBatch {
    pub id: i64,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_by_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderBatch {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// A deleted batch is never active, regardless of its `is_active` flag.
    pub fn is_effectively_active(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    /// Batch membership: the order is live, belongs to the batch's organization, and its order date falls in
    /// `[start_date, end_date)` of a batch that has not been deleted.
    pub fn contains(&self, order: &Order) -> bool {
        !order.is_deleted &&
            !self.is_deleted &&
            order.organization_id == self.organization_id &&
            self.range().contains(&order.order_date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderBatch {
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_by_id: String,
}

impl NewOrderBatch {
    pub fn new<O: Into<String>, N: Into<String>, C: Into<String>>(
        organization_id: O,
        name: N,
        range: DateRange,
        created_by_id: C,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            name: name.into(),
            description: None,
            start_date: range.start,
            end_date: range.end,
            is_active: true,
            created_by_id: created_by_id.into(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

//--------------------------------------    PayoutAdjustment   -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum AdjustmentType {
    Refund,
    Cancellation,
}

status_strings!(AdjustmentType { Refund, Cancellation });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum AdjustmentStatus {
    /// Recorded, waiting to be folded into the next payout invoice of the organization.
    Pending,
    /// Deducted from the payout invoice given by `adjustment_invoice_id`.
    Applied,
}

status_strings!(AdjustmentStatus { Pending, Applied });

/// A correction ledger entry deducting an already-paid-out order from a future payout.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PayoutAdjustment {
    pub id: i64,
    pub organization_id: String,
    pub order_id: OrderId,
    /// The payout invoice that already included the order.
    pub original_invoice_id: String,
    /// The payout invoice the deduction was folded into. Unset while pending.
    pub adjustment_invoice_id: Option<String>,
    pub adjustment_type: AdjustmentType,
    /// Always negative.
    pub amount: Amount,
    pub reason: String,
    pub status: AdjustmentStatus,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayoutAdjustment {
    pub organization_id: String,
    pub order_id: OrderId,
    pub original_invoice_id: String,
    pub adjustment_type: AdjustmentType,
    /// The sign is ignored. Adjustments are always stored as deductions.
    pub amount: Amount,
    pub reason: String,
}

impl NewPayoutAdjustment {
    pub fn new<O: Into<String>, I: Into<String>, R: Into<String>>(
        organization_id: O,
        order_id: OrderId,
        original_invoice_id: I,
        adjustment_type: AdjustmentType,
        amount: Amount,
        reason: R,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            order_id,
            original_invoice_id: original_invoice_id.into(),
            adjustment_type,
            amount,
            reason: reason.into(),
        }
    }
}

//-------------------------------------- VoucherRedemptionCost -------------------------------------------------------
/// Voucher details as they were when the voucher was redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherSnapshot {
    pub code: String,
    pub name: String,
    pub voucher_type: String,
    pub value: Amount,
}

/// Order details as they were when the voucher was redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_amount: Amount,
    pub order_date: DateTime<Utc>,
}

/// Seller organization details as they were when the voucher was redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerSnapshot {
    pub organization_id: String,
    pub name: String,
    pub payout_account: Option<String>,
}

/// The amount the platform, rather than the seller, absorbs when a refund-type voucher is redeemed.
///
/// Records are immutable once written. Corrections soft-delete the record and write a replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherRedemptionCost {
    pub id: i64,
    pub voucher_id: String,
    pub order_id: OrderId,
    pub seller_organization_id: String,
    pub amount_covered: Amount,
    pub voucher_snapshot: VoucherSnapshot,
    pub order_snapshot: OrderSnapshot,
    pub seller_snapshot: SellerSnapshot,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVoucherRedemptionCost {
    pub voucher_id: String,
    pub order_id: OrderId,
    pub seller_organization_id: String,
    pub amount_covered: Amount,
    pub voucher_snapshot: VoucherSnapshot,
    pub order_snapshot: OrderSnapshot,
    pub seller_snapshot: SellerSnapshot,
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn session(expires_at: Option<DateTime<Utc>>, invoice_expiry: Option<DateTime<Utc>>) -> CheckoutSession {
        CheckoutSession {
            id: 1,
            checkout_id: CheckoutId::from("chk-1"),
            customer_id: "alice".into(),
            order_ids: vec![OrderId::from("o1")],
            total_amount: Amount::from(100),
            status: SessionStatus::Pending,
            invoice: invoice_expiry.map(|expiry_date| InvoiceDetails {
                invoice_id: "inv".into(),
                invoice_url: "https://pay.example/inv".into(),
                expiry_date,
                created_at: ts(1, 0),
            }),
            invoice_created: invoice_expiry.is_some(),
            invoice_creation_attempts: 0,
            last_invoice_attempt_at: None,
            expires_at,
            paid_at: None,
            created_at: ts(1, 0),
            updated_at: ts(1, 0),
        }
    }

    fn order(org: &str, order_date: DateTime<Utc>) -> Order {
        Order {
            id: 1,
            order_id: OrderId::from("o1"),
            customer_id: "alice".into(),
            organization_id: org.into(),
            total_amount: Amount::from(500),
            order_date,
            status: OrderStatusType::Paid,
            is_deleted: false,
            paid_at: None,
            payment: PaymentAttachment::Unattached,
            created_at: order_date,
            updated_at: order_date,
        }
    }

    fn batch(org: &str) -> OrderBatch {
        OrderBatch {
            id: 1,
            organization_id: org.into(),
            name: "March".into(),
            description: None,
            start_date: ts(1, 0),
            end_date: ts(15, 0),
            is_active: true,
            is_deleted: false,
            created_by_id: "staff".into(),
            created_at: ts(1, 0),
            updated_at: ts(1, 0),
        }
    }

    #[test]
    fn lazy_expiry_is_a_function_of_time() {
        let s = session(Some(ts(2, 12)), None);
        assert_eq!(s.effective_status(ts(2, 11)), SessionStatus::Pending);
        assert!(s.is_usable(ts(2, 11)));
        assert_eq!(s.effective_status(ts(2, 12)), SessionStatus::Expired);
        assert!(!s.is_usable(ts(3, 0)));
        // The stored status is untouched
        assert_eq!(s.status, SessionStatus::Pending);
    }

    #[test]
    fn invoice_expiry_also_expires_the_session() {
        let s = session(None, Some(ts(2, 0)));
        assert_eq!(s.effective_status(ts(1, 23)), SessionStatus::Pending);
        assert_eq!(s.effective_status(ts(2, 0)), SessionStatus::Expired);
        let s = session(None, None);
        assert_eq!(s.effective_status(ts(28, 0)), SessionStatus::Pending);
    }

    #[test]
    fn terminal_states_are_not_rewritten_by_expiry() {
        let mut s = session(Some(ts(2, 0)), None);
        s.status = SessionStatus::Paid;
        assert_eq!(s.effective_status(ts(5, 0)), SessionStatus::Paid);
        s.status = SessionStatus::Cancelled;
        assert_eq!(s.effective_status(ts(5, 0)), SessionStatus::Cancelled);
        assert!(SessionStatus::Expired.is_terminal());
        assert!(!SessionStatus::Pending.is_terminal());
    }

    #[test]
    fn idempotency_key_is_stable_until_an_invoice_exists() {
        let mut s = session(None, None);
        s.invoice_creation_attempts = 2;
        assert_eq!(s.invoice_idempotency_key(), "chk-1");
        s.invoice_creation_attempts = 3;
        assert_eq!(s.invoice_idempotency_key(), "chk-1");
        s.invoice_created = true;
        assert_eq!(s.invoice_idempotency_key(), "chk-1:refresh:3");
    }

    #[test]
    fn batch_membership_is_half_open() {
        let b = batch("org-1");
        assert!(b.contains(&order("org-1", ts(1, 0))));
        assert!(b.contains(&order("org-1", ts(15, 0) - Duration::seconds(1))));
        assert!(!b.contains(&order("org-1", ts(15, 0))));
        assert!(!b.contains(&order("org-1", ts(1, 0) - Duration::seconds(1))));
    }

    #[test]
    fn batch_membership_excludes_other_orgs_and_deleted_records() {
        let mut b = batch("org-1");
        assert!(!b.contains(&order("org-2", ts(3, 0))));
        let mut o = order("org-1", ts(3, 0));
        o.is_deleted = true;
        assert!(!b.contains(&o));
        o.is_deleted = false;
        b.is_deleted = true;
        assert!(!b.contains(&o));
        assert!(!b.is_effectively_active());
    }

    #[test]
    fn inactive_batches_still_define_membership() {
        let mut b = batch("org-1");
        b.is_active = false;
        assert!(b.contains(&order("org-1", ts(3, 0))));
        assert!(!b.is_effectively_active());
    }

    #[test]
    fn date_ranges() {
        let a = DateRange::new(ts(1, 0), ts(10, 0));
        let b = DateRange::new(ts(10, 0), ts(20, 0));
        let c = DateRange::new(ts(9, 0), ts(11, 0));
        assert!(a.is_valid());
        assert!(!DateRange::new(ts(2, 0), ts(2, 0)).is_valid());
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn status_strings_round_trip() {
        for s in ["Pending", "Paid", "Expired", "Cancelled"] {
            assert_eq!(s.parse::<SessionStatus>().unwrap().to_string(), s);
        }
        assert!("paid".parse::<SessionStatus>().is_err());
        assert_eq!("Refund".parse::<AdjustmentType>().unwrap(), AdjustmentType::Refund);
        assert!("".parse::<OrderId>().is_err());
    }
}
