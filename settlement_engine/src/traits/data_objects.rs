use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{
    AdjustmentStatus,
    Amount,
    CheckoutId,
    CheckoutSession,
    DateRange,
    DirectCheckout,
    InvoiceDetails,
    OrderId,
    PayoutAdjustment,
};

//--------------------------------------     SessionCommand    -------------------------------------------------------
/// A mutation of a checkout session. Each variant carries exactly the data its transition needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionCommand {
    /// Record a (new) gateway invoice on the session and on every order linked to it.
    RefreshInvoice(InvoiceDetails),
    /// Pending → Paid, and mark every order of the session as paid.
    MarkPaid { paid_at: DateTime<Utc> },
    /// Pending → Expired.
    Expire,
    /// Pending → Cancelled.
    Cancel,
}

impl Display for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionCommand::RefreshInvoice(inv) => write!(f, "RefreshInvoice({})", inv.invoice_id),
            SessionCommand::MarkPaid { paid_at } => write!(f, "MarkPaid({paid_at})"),
            SessionCommand::Expire => write!(f, "Expire"),
            SessionCommand::Cancel => write!(f, "Cancel"),
        }
    }
}

/// The result of applying a [`SessionCommand`]. `applied` is false when the command was a no-op because the
/// session was no longer `Pending`. `session` always reflects the state after the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub session: CheckoutSession,
    pub applied: bool,
}

impl SessionUpdate {
    pub fn applied(session: CheckoutSession) -> Self {
        Self { session, applied: true }
    }

    pub fn unchanged(session: CheckoutSession) -> Self {
        Self { session, applied: false }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpiryResult {
    pub expired: Vec<CheckoutSession>,
}

impl ExpiryResult {
    pub fn count(&self) -> usize {
        self.expired.len()
    }

    pub fn checkout_ids(&self) -> Vec<&CheckoutId> {
        self.expired.iter().map(|s| &s.checkout_id).collect()
    }
}

//--------------------------------------     PaymentCommand    -------------------------------------------------------
/// A write to the payment attachment of one or more orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentCommand {
    /// Attach a single-order checkout link.
    AttachDirectCheckout { order_id: OrderId, checkout: DirectCheckout },
    /// Write the invoice to the pending session `checkout_id` and to every live order linked to it.
    PropagateSessionInvoice { checkout_id: CheckoutId, invoice: InvoiceDetails },
}

//--------------------------------------    OrderQueryFilter   -------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub organization_id: Option<String>,
    pub customer_id: Option<String>,
    pub checkout_id: Option<CheckoutId>,
    pub order_date: Option<DateRange>,
    pub include_deleted: bool,
}

impl OrderQueryFilter {
    pub fn with_organization_id<S: Into<String>>(mut self, organization_id: S) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_checkout_id(mut self, checkout_id: CheckoutId) -> Self {
        self.checkout_id = Some(checkout_id);
        self
    }

    pub fn with_order_date(mut self, range: DateRange) -> Self {
        self.order_date = Some(range);
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

//--------------------------------------      BatchCommand     -------------------------------------------------------
/// An edit made by organization staff to an order batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchCommand {
    Rename { name: String, description: Option<String> },
    Reschedule(DateRange),
    SetActive(bool),
    ToggleActive,
    SoftDelete,
}

impl Display for BatchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchCommand::Rename { name, .. } => write!(f, "Rename({name})"),
            BatchCommand::Reschedule(range) => write!(f, "Reschedule{range}"),
            BatchCommand::SetActive(v) => write!(f, "SetActive({v})"),
            BatchCommand::ToggleActive => write!(f, "ToggleActive"),
            BatchCommand::SoftDelete => write!(f, "SoftDelete"),
        }
    }
}

/// Query over non-deleted batches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchQueryFilter {
    pub organization_id: Option<String>,
    /// Only batches whose range overlaps this range.
    pub overlapping: Option<DateRange>,
    pub active_only: bool,
}

impl BatchQueryFilter {
    pub fn for_organization<S: Into<String>>(organization_id: S) -> Self {
        Self { organization_id: Some(organization_id.into()), ..Default::default() }
    }

    pub fn overlapping(mut self, range: DateRange) -> Self {
        self.overlapping = Some(range);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }
}

//--------------------------------------  Payout adjustments   -------------------------------------------------------
#[derive(Debug, Clone)]
pub enum InsertAdjustmentResult {
    Inserted(PayoutAdjustment),
    AlreadyExists(PayoutAdjustment),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdjustmentQueryFilter {
    pub organization_id: Option<String>,
    pub order_id: Option<OrderId>,
    pub status: Option<AdjustmentStatus>,
    pub adjustment_invoice_id: Option<String>,
}

impl AdjustmentQueryFilter {
    pub fn with_organization_id<S: Into<String>>(mut self, organization_id: S) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_status(mut self, status: AdjustmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_adjustment_invoice_id<S: Into<String>>(mut self, invoice_id: S) -> Self {
        self.adjustment_invoice_id = Some(invoice_id.into());
        self
    }
}

/// The outcome of folding pending adjustments into a payout invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAdjustments {
    pub adjustment_invoice_id: String,
    /// The adjustments that are now applied to `adjustment_invoice_id`, including any that already were.
    pub adjustments: Vec<PayoutAdjustment>,
}

impl AppliedAdjustments {
    pub fn count(&self) -> usize {
        self.adjustments.len()
    }

    /// The signed sum to add to the payout invoice total. Never positive.
    pub fn total(&self) -> Amount {
        self.adjustments.iter().map(|a| a.amount).sum()
    }
}

//--------------------------------------  Redemption costs     -------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedemptionCostQueryFilter {
    pub voucher_id: Option<String>,
    pub order_id: Option<OrderId>,
    pub seller_organization_id: Option<String>,
    /// Filters on `created_at`, half-open.
    pub created: Option<DateRange>,
    pub include_deleted: bool,
}

impl RedemptionCostQueryFilter {
    pub fn with_voucher_id<S: Into<String>>(mut self, voucher_id: S) -> Self {
        self.voucher_id = Some(voucher_id.into());
        self
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_seller<S: Into<String>>(mut self, seller_organization_id: S) -> Self {
        self.seller_organization_id = Some(seller_organization_id.into());
        self
    }

    pub fn created_in(mut self, range: DateRange) -> Self {
        self.created = Some(range);
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}
