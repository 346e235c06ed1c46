//! # Settlement engine public API
//!
//! The `settlement_api` module exposes the programmatic API of the settlement engine. Each API covers one component
//! and only requires the backend traits it actually uses, so callers can pick the parts they need.
//!
//! * [`CheckoutApi`] runs the checkout session lifecycle: session creation, gateway invoices, payment confirmation,
//!   cancellation and expiry.
//! * [`AttachmentApi`] writes the payment attachment of individual orders and mirrors orders from the order
//!   lifecycle service.
//! * [`BatchApi`] manages order batches for payout computation.
//! * [`AdjustmentApi`] is the payout adjustment ledger for refunds and cancellations of already paid-out orders.
//! * [`VoucherCostApi`] records the platform-covered cost of voucher redemptions.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs:
//!
//! ```rust,ignore
//! use settlement_engine::{BatchApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/settlement.db", 5).await?;
//! // SqliteDatabase implements BatchManagement
//! let api = BatchApi::new(db);
//! let batches = api.list_batches_overlapping("org-1", range).await?;
//! ```
mod adjustment_api;
mod attachment_api;
mod batch_api;
mod checkout_api;
mod settlement_objects;
mod voucher_cost_api;

pub use adjustment_api::AdjustmentApi;
pub use attachment_api::AttachmentApi;
pub use batch_api::BatchApi;
pub use checkout_api::CheckoutApi;
pub use settlement_objects::{
    AdjustmentRecorded,
    Clock,
    ConfirmationResult,
    PaymentConfirmation,
    PaymentReference,
    RedemptionCostSummary,
    RetryPolicy,
};
pub use voucher_cost_api::VoucherCostApi;
