//! # Backend contracts
//!
//! This module defines the interfaces that database backends (and the payment gateway adapter) must implement in
//! order to be driven by the settlement engine APIs.
//!
//! * [`CheckoutManagement`] stores checkout sessions and owns the session state machine transitions, including the
//!   transactional session → orders fan-out.
//! * [`OrderManagement`] mirrors orders from the order lifecycle service and writes their payment attachment.
//! * [`BatchManagement`] stores order batches and answers batch membership queries.
//! * [`AdjustmentManagement`] is the payout adjustment ledger.
//! * [`VoucherCostManagement`] is the append-only voucher redemption cost log.
//! * [`PaymentGateway`] is the uniform contract over external payment providers.
//!
//! Each trait has its own error type, so that callers only need to handle the failures their API can produce.
mod adjustment_management;
mod batch_management;
mod checkout_management;
mod data_objects;
mod order_management;
mod payment_gateway;
mod voucher_cost_management;

pub use adjustment_management::{AdjustmentError, AdjustmentManagement};
pub use batch_management::{BatchError, BatchManagement};
pub use checkout_management::{CheckoutError, CheckoutManagement};
pub use data_objects::{
    AdjustmentQueryFilter,
    AppliedAdjustments,
    BatchCommand,
    BatchQueryFilter,
    ExpiryResult,
    InsertAdjustmentResult,
    OrderQueryFilter,
    PaymentCommand,
    RedemptionCostQueryFilter,
    SessionCommand,
    SessionUpdate,
};
pub use order_management::{OrderAttachmentError, OrderManagement};
pub use payment_gateway::{GatewayError, GatewayInvoice, InvoiceLineItem, InvoiceRequest, PaymentGateway};
pub use voucher_cost_management::{VoucherCostError, VoucherCostManagement};
